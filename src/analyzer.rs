//! Entry analysis using an LLM.
//!
//! `EntryAnalyzer` asks an Ollama-compatible model for an entry's themes,
//! tone, type and one-line summary, and turns the answer into a typed
//! `EntryMeta`. Answers that do not fit that shape are rejected rather
//! than patched with defaults.

mod normalizer;

use std::sync::Arc;

use serde::Deserialize;

pub use normalizer::ThemeNormalizer;

use crate::models::{EntryKind, EntryMeta, Tone};
use crate::ollama::{OllamaClientTrait, OllamaError};

const PROMPT_TEMPLATE: &str = r#"You are a quiet metadata engine for a personal idea vault app.

Given the user's note, produce JSON ONLY with keys:
- themes: array of 3 to 6 short themes (max 3 words each), lowercase
- tone: one of [curious, technical, reflective, playful, urgent, uncertain, confident]
- type: one of [game, app, prompt, story, system, note]
- summary: one sentence, <= 18 words, neutral, no advice

Return STRICT JSON. No markdown. No extra text.

NOTE:
- themes must be helpful for clustering similar notes
- if unsure, choose tone "reflective" and type "note"

USER NOTE:
"""{text}""""#;

/// The model's answer as it arrives, before label validation.
#[derive(Debug, Deserialize)]
struct RawMeta {
    themes: Vec<String>,
    tone: String,
    #[serde(rename = "type")]
    kind: String,
    summary: String,
}

/// Annotates entry text with metadata.
///
/// ```no_run
/// use std::sync::Arc;
/// use vaulta::analyzer::EntryAnalyzer;
/// use vaulta::ollama::OllamaClientBuilder;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OllamaClientBuilder::new().build()?;
/// let model = client.model().to_string();
/// let analyzer = EntryAnalyzer::new(Arc::new(client));
///
/// let meta = analyzer.analyze(&model, "a tabletop game played with tide charts")?;
/// println!("{:?} / {} / {}", meta.themes, meta.tone, meta.kind);
/// # Ok(())
/// # }
/// ```
pub struct EntryAnalyzer {
    client: Arc<dyn OllamaClientTrait>,
}

impl EntryAnalyzer {
    #[must_use]
    pub fn new(client: Arc<dyn OllamaClientTrait>) -> Self {
        Self { client }
    }

    /// Analyzes `text` with `model`.
    ///
    /// # Errors
    ///
    /// Returns `OllamaError` if the request fails, or `OllamaError::Api` if
    /// the answer holds no JSON object, misses a field, has a field of the
    /// wrong type, or names an unknown tone or type.
    pub fn analyze(&self, model: &str, text: &str) -> Result<EntryMeta, OllamaError> {
        let prompt = PROMPT_TEMPLATE.replace("{text}", text);
        let response = self.client.generate(model, &prompt)?;

        let json = extract_json(&response).ok_or_else(|| OllamaError::Api {
            message: "Ollama returned non-JSON response".to_string(),
        })?;

        let meta = parse_entry_meta(json)?;
        tracing::debug!(model, themes = meta.themes.len(), "analyzed entry");
        Ok(meta)
    }
}

/// Extracts the outermost `{...}` from a model response.
///
/// Handles clean JSON, markdown code fences and chatter around the object.
pub(crate) fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (start < end).then(|| &response[start..=end])
}

/// Parses and validates analyzer JSON into `EntryMeta`.
fn parse_entry_meta(json: &str) -> Result<EntryMeta, OllamaError> {
    let raw: RawMeta = serde_json::from_str(json).map_err(|e| OllamaError::Api {
        message: format!("Malformed metadata: {e}"),
    })?;

    let tone: Tone = raw.tone.parse().map_err(|e| OllamaError::Api {
        message: format!("Malformed metadata: {e}"),
    })?;
    let kind: EntryKind = raw.kind.parse().map_err(|e| OllamaError::Api {
        message: format!("Malformed metadata: {e}"),
    })?;

    Ok(EntryMeta {
        themes: ThemeNormalizer::normalize_themes(raw.themes),
        tone,
        kind,
        summary: raw.summary.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockOllamaClient {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    impl MockOllamaClient {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl OllamaClientTrait for MockOllamaClient {
        fn generate(&self, _model: &str, prompt: &str) -> Result<String, OllamaError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }
    }

    const GOOD: &str = r#"{
        "themes": ["Tides", "board games", "tides"],
        "tone": "playful",
        "type": "game",
        "summary": " A board game driven by tide tables. "
    }"#;

    #[test]
    fn analyze_returns_typed_meta() {
        let analyzer = EntryAnalyzer::new(Arc::new(MockOllamaClient::new(GOOD)));

        let meta = analyzer.analyze("test-model", "tide chart game").unwrap();

        assert_eq!(meta.themes, vec!["tides", "board games"]);
        assert_eq!(meta.tone, Tone::Playful);
        assert_eq!(meta.kind, EntryKind::Game);
        assert_eq!(meta.summary, "A board game driven by tide tables.");
    }

    #[test]
    fn prompt_embeds_entry_text() {
        let mock = Arc::new(MockOllamaClient::new(GOOD));
        let analyzer = EntryAnalyzer::new(mock.clone());

        analyzer.analyze("m", "lanterns on the river").unwrap();

        let prompts = mock.prompts.lock().unwrap();
        assert!(prompts[0].contains(r#""""lanterns on the river""""#));
        assert!(!prompts[0].contains("{text}"));
    }

    #[test]
    fn extract_json_handles_code_fences_and_preamble() {
        let response = "Sure! Here you go:\n```json\n{\"a\": 1}\n```\nAnything else?";
        assert_eq!(extract_json(response), Some("{\"a\": 1}"));
    }

    #[test]
    fn extract_json_keeps_nested_objects() {
        let response = r#"{"outer": {"inner": true}}"#;
        assert_eq!(extract_json(response), Some(response));
    }

    #[test]
    fn extract_json_returns_none_without_braces() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn non_json_response_is_rejected() {
        let analyzer = EntryAnalyzer::new(Arc::new(MockOllamaClient::new("I cannot help.")));

        let err = analyzer.analyze("m", "anything").unwrap_err();

        assert!(matches!(err, OllamaError::Api { .. }));
        assert!(err.to_string().contains("non-JSON"));
    }

    #[test]
    fn missing_field_is_rejected() {
        let json = r#"{"themes": ["x"], "tone": "curious", "summary": "s"}"#;
        assert!(matches!(
            parse_entry_meta(json),
            Err(OllamaError::Api { .. })
        ));
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        let json = r#"{"themes": "x, y", "tone": "curious", "type": "note", "summary": "s"}"#;
        assert!(parse_entry_meta(json).is_err());

        let json = r#"{"themes": [1, 2], "tone": "curious", "type": "note", "summary": "s"}"#;
        assert!(parse_entry_meta(json).is_err());
    }

    #[test]
    fn unknown_tone_or_type_is_rejected() {
        let json = r#"{"themes": ["x"], "tone": "sleepy", "type": "note", "summary": "s"}"#;
        let err = parse_entry_meta(json).unwrap_err();
        assert!(err.to_string().contains("unknown tone 'sleepy'"));

        let json = r#"{"themes": ["x"], "tone": "curious", "type": "poem", "summary": "s"}"#;
        let err = parse_entry_meta(json).unwrap_err();
        assert!(err.to_string().contains("unknown type 'poem'"));
    }

    #[test]
    fn labels_are_accepted_case_insensitively() {
        let json = r#"{"themes": [], "tone": "Technical", "type": "SYSTEM", "summary": ""}"#;
        let meta = parse_entry_meta(json).unwrap();
        assert_eq!(meta.tone, Tone::Technical);
        assert_eq!(meta.kind, EntryKind::System);
        assert!(meta.themes.is_empty());
    }

    #[test]
    fn client_errors_propagate() {
        struct FailingClient;

        impl OllamaClientTrait for FailingClient {
            fn generate(&self, _model: &str, _prompt: &str) -> Result<String, OllamaError> {
                Err(OllamaError::Http { status: 500 })
            }
        }

        let analyzer = EntryAnalyzer::new(Arc::new(FailingClient));
        assert!(matches!(
            analyzer.analyze("m", "text"),
            Err(OllamaError::Http { status: 500 })
        ));
    }
}
