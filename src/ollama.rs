/// Ollama HTTP client module.
///
/// Blocking client for the local model runtime, with error classification,
/// retry logic and timeout configuration.
mod client;

pub use client::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, OllamaClient, OllamaClientBuilder, OllamaClientTrait,
    OllamaError, retry_with_backoff,
};
