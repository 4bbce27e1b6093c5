use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error returned when a tone or type label is not one of the known values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {field} '{value}'")]
pub struct UnknownLabel {
    pub field: &'static str,
    pub value: String,
}

/// Emotional register of an entry, as judged by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Curious,
    Technical,
    Reflective,
    Playful,
    Urgent,
    Uncertain,
    Confident,
}

impl Tone {
    pub const ALL: [Tone; 7] = [
        Tone::Curious,
        Tone::Technical,
        Tone::Reflective,
        Tone::Playful,
        Tone::Urgent,
        Tone::Uncertain,
        Tone::Confident,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Curious => "curious",
            Self::Technical => "technical",
            Self::Reflective => "reflective",
            Self::Playful => "playful",
            Self::Urgent => "urgent",
            Self::Uncertain => "uncertain",
            Self::Confident => "confident",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tone {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|tone| tone.as_str() == wanted)
            .ok_or(UnknownLabel {
                field: "tone",
                value: s.to_string(),
            })
    }
}

/// What kind of fragment an entry is (game idea, story seed, plain note...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Game,
    App,
    Prompt,
    Story,
    System,
    Note,
}

impl EntryKind {
    pub const ALL: [EntryKind; 6] = [
        EntryKind::Game,
        EntryKind::App,
        EntryKind::Prompt,
        EntryKind::Story,
        EntryKind::System,
        EntryKind::Note,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Game => "game",
            Self::App => "app",
            Self::Prompt => "prompt",
            Self::Story => "story",
            Self::System => "system",
            Self::Note => "note",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or(UnknownLabel {
                field: "type",
                value: s.to_string(),
            })
    }
}

/// Metadata attached to an entry after analysis.
///
/// Only fully typed metadata is ever stored; partial analyzer output is
/// rejected before it reaches an `Entry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Short lowercase theme labels, in the order the analyzer produced them.
    pub themes: Vec<String>,
    pub tone: Tone,
    /// Serialized as `type` to match the analyzer and export formats.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// One-sentence neutral summary.
    pub summary: String,
}

impl EntryMeta {
    pub fn new(
        themes: Vec<String>,
        tone: Tone,
        kind: EntryKind,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            themes,
            tone,
            kind,
            summary: summary.into(),
        }
    }
}
