//! Blocking HTTP client for the Ollama API.
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Base URL used when neither the builder nor `OLLAMA_HOST` provide one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Model used when neither the builder nor `OLLAMA_MODEL` provide one.
pub const DEFAULT_MODEL: &str = "llama3.1:latest";

/// Errors that can occur when interacting with the Ollama API.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Ollama is not running or not listening at the configured URL
    #[error("Ollama is not running (or not reachable) at {base_url}")]
    Unreachable {
        base_url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Other network-level failures
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Request or response timeout errors
    #[error("Request timed out")]
    Timeout(#[source] reqwest::Error),

    /// HTTP errors with status code
    #[error("HTTP error: status {status}")]
    Http { status: u16 },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The model answered, but not with what we asked for
    #[error("Ollama API error: {message}")]
    Api { message: String },

    /// Invalid URL configuration error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl OllamaError {
    /// Classifies a transport error from reqwest.
    fn from_transport(base_url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error)
        } else if error.is_connect() {
            Self::Unreachable {
                base_url: base_url.to_string(),
                source: error,
            }
        } else {
            Self::Network(error)
        }
    }
}

/// Builder for constructing `OllamaClient` instances.
///
/// # Examples
///
/// ```
/// use vaulta::ollama::OllamaClientBuilder;
///
/// let client = OllamaClientBuilder::new()
///     .base_url("http://localhost:11434")
///     .model("llama3.1:latest")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.model(), "llama3.1:latest");
/// ```
#[derive(Debug, Default)]
pub struct OllamaClientBuilder {
    base_url: Option<String>,
    model: Option<String>,
    timeout: Option<Duration>,
}

impl OllamaClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL for the Ollama API (e.g. "http://localhost:11434").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the default model name (e.g. "llama3.1:latest").
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Overrides the per-request timeout (default 60s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the `OllamaClient`.
    ///
    /// # Environment Variables
    ///
    /// Without an explicit `base_url()`, `OLLAMA_HOST` is used, then
    /// [`DEFAULT_BASE_URL`]. Without an explicit `model()`, `OLLAMA_MODEL`
    /// is used, then [`DEFAULT_MODEL`].
    pub fn build(self) -> Result<OllamaClient, OllamaError> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("OLLAMA_HOST").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        let model = self
            .model
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        reqwest::Url::parse(&base_url)
            .map_err(|e| OllamaError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(60)))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(OllamaError::Network)?;

        Ok(OllamaClient {
            client,
            base_url,
            model,
        })
    }
}

/// Synchronous client for the Ollama API.
///
/// Construct it with `OllamaClientBuilder`.
pub struct OllamaClient {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

/// Text generation seam.
///
/// The analyzer and reflector only need `generate`, so tests swap in mocks.
pub trait OllamaClientTrait: Send + Sync {
    /// Sends `prompt` to `model` and returns the generated text.
    fn generate(&self, model: &str, prompt: &str) -> Result<String, OllamaError>;
}

impl OllamaClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The default model for this client.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Checks that Ollama answers on `/api/tags`.
    pub fn check(&self) -> Result<(), OllamaError> {
        self.list_models().map(|_| ())
    }

    /// Lists installed models, largest first.
    pub fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| OllamaError::from_transport(&self.base_url, e))?;

        if !response.status().is_success() {
            return Err(OllamaError::Http {
                status: response.status().as_u16(),
            });
        }

        let json: serde_json::Value = response.json().map_err(OllamaError::Network)?;
        Ok(parse_model_list(&json))
    }

    fn generate_internal(&self, model: &str, prompt: &str) -> Result<String, OllamaError> {
        let url = format!("{}/api/generate", self.base_url);
        let request_body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false
        });

        retry_with_backoff(|| {
            let response = self
                .client
                .post(&url)
                .json(&request_body)
                .send()
                .map_err(|e| OllamaError::from_transport(&self.base_url, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(OllamaError::Http {
                    status: status.as_u16(),
                });
            }

            let json: serde_json::Value = response.json().map_err(OllamaError::Network)?;

            json.get("response")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| OllamaError::Api {
                    message: "Missing 'response' field in API response".to_string(),
                })
        })
    }
}

impl OllamaClientTrait for OllamaClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, OllamaError> {
        tracing::debug!(model, prompt_len = prompt.len(), "ollama generate");
        self.generate_internal(model, prompt)
    }
}

/// Extracts model names from an `/api/tags` payload, largest first.
fn parse_model_list(json: &serde_json::Value) -> Vec<String> {
    let mut models: Vec<(String, u64)> = json
        .get("models")
        .and_then(|m| m.as_array())
        .map(|models| {
            models
                .iter()
                .filter_map(|model| {
                    let name = model.get("name").and_then(|n| n.as_str())?;
                    let size = model.get("size").and_then(|s| s.as_u64()).unwrap_or(0);
                    Some((name.to_string(), size))
                })
                .collect()
        })
        .unwrap_or_default();

    models.sort_by(|a, b| b.1.cmp(&a.1));
    models.into_iter().map(|(name, _)| name).collect()
}

/// Retry delays in seconds between attempts.
const RETRY_DELAYS: [u64; 3] = [1, 2, 4];

/// Retries an operation with exponential backoff.
///
/// Up to three retries after the first attempt, sleeping 1s, 2s and 4s.
/// Only transient errors (network, timeout, HTTP 5xx) are retried.
pub fn retry_with_backoff<F, T>(f: F) -> Result<T, OllamaError>
where
    F: FnMut() -> Result<T, OllamaError>,
{
    retry_with_delays(f, &RETRY_DELAYS.map(Duration::from_secs))
}

fn retry_with_delays<F, T>(mut f: F, delays: &[Duration]) -> Result<T, OllamaError>
where
    F: FnMut() -> Result<T, OllamaError>,
{
    let mut last_error = match f() {
        Ok(result) => return Ok(result),
        Err(e) if !should_retry(&e) => return Err(e),
        Err(e) => e,
    };

    for (attempt, delay) in delays.iter().enumerate() {
        tracing::warn!(attempt = attempt + 1, error = %last_error, "retrying ollama request");
        thread::sleep(*delay);

        match f() {
            Ok(result) => return Ok(result),
            Err(e) if !should_retry(&e) => return Err(e),
            Err(e) => last_error = e,
        }
    }

    Err(last_error)
}

/// Transient errors are retried; client errors, bad answers and an
/// unreachable server are not.
fn should_retry(error: &OllamaError) -> bool {
    match error {
        OllamaError::Network(_) | OllamaError::Timeout(_) => true,
        OllamaError::Http { status } => (500..600).contains(status),
        OllamaError::Unreachable { .. }
        | OllamaError::Serialization(_)
        | OllamaError::Api { .. }
        | OllamaError::InvalidUrl(_) => false,
    }
}
