use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{EntryId, EntryMeta};

/// A captured fragment of text, optionally annotated with metadata.
///
/// Entries are the primary unit of capture. Metadata is absent until the
/// entry has been analyzed; such entries are "unfiled".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<EntryMeta>,
}

impl Entry {
    /// Returns the entry's themes, or an empty slice when unanalyzed.
    pub fn themes(&self) -> &[String] {
        self.meta.as_ref().map_or(&[], |meta| meta.themes.as_slice())
    }

    /// An entry with no metadata has not been filed by the analyzer yet.
    pub fn is_unfiled(&self) -> bool {
        self.meta.is_none()
    }
}

/// Builder for constructing `Entry` instances with optional fields.
///
/// # Examples
///
/// ```
/// use vaulta::EntryBuilder;
///
/// let entry = EntryBuilder::new()
///     .id("a")
///     .text("A city that only exists at night")
///     .themes(["cities", "night"])
///     .build();
///
/// assert_eq!(entry.id.as_str(), "a");
/// assert_eq!(entry.themes(), ["cities", "night"]);
/// ```
#[derive(Debug, Default)]
pub struct EntryBuilder {
    id: Option<EntryId>,
    text: Option<String>,
    created_at: Option<OffsetDateTime>,
    meta: Option<EntryMeta>,
}

impl EntryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<EntryId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn meta(mut self, meta: EntryMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Sets metadata carrying only the given themes (tone reflective, type note).
    ///
    /// Convenient for graph work where only themes matter.
    pub fn themes<I, S>(mut self, themes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let themes = themes.into_iter().map(Into::into).collect();
        self.meta = Some(EntryMeta::new(
            themes,
            super::Tone::Reflective,
            super::EntryKind::Note,
            "",
        ));
        self
    }

    /// Builds the `Entry`.
    ///
    /// Missing id defaults to a fresh UUID, missing text to the empty string
    /// and missing timestamp to now.
    pub fn build(self) -> Entry {
        Entry {
            id: self.id.unwrap_or_else(EntryId::generate),
            text: self.text.unwrap_or_default(),
            created_at: self.created_at.unwrap_or_else(OffsetDateTime::now_utc),
            meta: self.meta,
        }
    }
}
