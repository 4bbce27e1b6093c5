use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::ReflectionId;

/// A model-written look back over the recent entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reflection {
    pub id: ReflectionId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Model that produced the reflection.
    pub model: String,
    pub highlights: Vec<String>,
    pub themes: Vec<String>,
    pub note: String,
    /// How many entries the reflection was written over.
    pub entry_count: usize,
}
