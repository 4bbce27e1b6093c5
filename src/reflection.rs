//! Weekly reflections over recent entries.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use crate::analyzer::{ThemeNormalizer, extract_json};
use crate::models::{Entry, Reflection, ReflectionId};
use crate::ollama::{OllamaClientTrait, OllamaError};

/// How far back a reflection looks.
pub const REFLECTION_WINDOW: Duration = Duration::days(7);

/// Longest entry excerpt sent to the model, in characters.
const EXCERPT_MAX_CHARS: usize = 400;

const PROMPT_TEMPLATE: &str = r#"You are a gentle reflection companion for a personal idea vault.

Below are the user's fragments from the last 7 days, oldest first.
Produce JSON ONLY with keys:
- highlights: array of 2 to 5 short phrases naming what stood out
- themes: array of up to 5 recurring themes, lowercase, max 3 words each
- note: two or three sentences, warm and neutral, no advice, no questions

Return STRICT JSON. No markdown. No extra text.

FRAGMENTS:
{fragments}"#;

#[derive(Debug, Error)]
pub enum ReflectError {
    #[error("No fragments in the last 7 days to reflect on.")]
    NothingToReflectOn,

    #[error(transparent)]
    Ollama(#[from] OllamaError),
}

#[derive(Debug, Deserialize)]
struct RawReflection {
    highlights: Vec<String>,
    themes: Vec<String>,
    note: String,
}

/// Entries created within [`REFLECTION_WINDOW`] of `now`, oldest first.
pub fn recent_entries(entries: &[Entry], now: OffsetDateTime) -> Vec<&Entry> {
    let mut recent: Vec<&Entry> = entries
        .iter()
        .filter(|entry| now - entry.created_at <= REFLECTION_WINDOW)
        .collect();
    recent.sort_by_key(|entry| entry.created_at);
    recent
}

/// Writes reflections with an LLM.
pub struct Reflector {
    client: Arc<dyn OllamaClientTrait>,
}

impl Reflector {
    #[must_use]
    pub fn new(client: Arc<dyn OllamaClientTrait>) -> Self {
        Self { client }
    }

    /// Reflects over the entries from the last week.
    ///
    /// Entries older than the window are ignored; if none remain the call
    /// fails with [`ReflectError::NothingToReflectOn`] without contacting
    /// the model.
    pub fn reflect(
        &self,
        model: &str,
        entries: &[Entry],
        now: OffsetDateTime,
    ) -> Result<Reflection, ReflectError> {
        let recent = recent_entries(entries, now);
        if recent.is_empty() {
            return Err(ReflectError::NothingToReflectOn);
        }

        let prompt = PROMPT_TEMPLATE.replace("{fragments}", &render_fragments(&recent));
        let response = self.client.generate(model, &prompt)?;

        let json = extract_json(&response).ok_or_else(|| OllamaError::Api {
            message: "Ollama returned non-JSON response".to_string(),
        })?;
        let raw: RawReflection = serde_json::from_str(json).map_err(|e| OllamaError::Api {
            message: format!("Malformed reflection: {e}"),
        })?;

        tracing::info!(model, entries = recent.len(), "wrote reflection");

        Ok(Reflection {
            id: ReflectionId::generate(),
            created_at: now,
            model: model.to_string(),
            highlights: raw
                .highlights
                .into_iter()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect(),
            themes: ThemeNormalizer::normalize_themes(raw.themes),
            note: raw.note.trim().to_string(),
            entry_count: recent.len(),
        })
    }
}

fn render_fragments(entries: &[&Entry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let mut excerpt: String = entry.text.chars().take(EXCERPT_MAX_CHARS).collect();
            if entry.text.chars().count() > EXCERPT_MAX_CHARS {
                excerpt.push('…');
            }
            let themes = entry.themes();
            if themes.is_empty() {
                format!("- {excerpt}")
            } else {
                format!("- {excerpt} [themes: {}]", themes.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
