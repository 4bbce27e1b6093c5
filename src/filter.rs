//! View-level filtering of entries.
//!
//! Filters narrow the entry list before it is handed to the graph builder
//! or the theme counter. Every active filter must match (AND); within the
//! theme filter any listed theme is enough (OR).

use std::fmt;
use std::str::FromStr;

use time::{Duration, OffsetDateTime};

use crate::models::{Entry, EntryKind, UnknownLabel};

/// Restricts entries by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFilter {
    #[default]
    Any,
    Last7Days,
    Last30Days,
    ThisYear,
}

impl DateFilter {
    fn matches(self, created_at: OffsetDateTime, now: OffsetDateTime) -> bool {
        match self {
            DateFilter::Any => true,
            DateFilter::Last7Days => now - created_at <= Duration::days(7),
            DateFilter::Last30Days => now - created_at <= Duration::days(30),
            DateFilter::ThisYear => created_at.year() == now.year(),
        }
    }
}

impl FromStr for DateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(DateFilter::Any),
            "7d" => Ok(DateFilter::Last7Days),
            "30d" => Ok(DateFilter::Last30Days),
            "year" => Ok(DateFilter::ThisYear),
            other => Err(format!(
                "unknown date filter '{other}' (expected any, 7d, 30d or year)"
            )),
        }
    }
}

/// One accepted value of the type filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    Kind(EntryKind),
    /// Entries that have not been analyzed yet.
    Unfiled,
}

impl KindFilter {
    fn matches(self, entry: &Entry) -> bool {
        match (self, &entry.meta) {
            (KindFilter::Kind(kind), Some(meta)) => meta.kind == kind,
            (KindFilter::Unfiled, None) => true,
            _ => false,
        }
    }
}

impl FromStr for KindFilter {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("unfiled") {
            return Ok(KindFilter::Unfiled);
        }
        s.parse().map(KindFilter::Kind)
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindFilter::Kind(kind) => kind.fmt(f),
            KindFilter::Unfiled => f.write_str("unfiled"),
        }
    }
}

/// A combination of search, type, theme and date filters.
///
/// The default filter lets everything through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub query: Option<String>,
    pub kinds: Vec<KindFilter>,
    pub themes: Vec<String>,
    pub date: DateFilter,
}

impl EntryFilter {
    pub fn is_empty(&self) -> bool {
        self.query.as_deref().is_none_or(|q| q.trim().is_empty())
            && self.kinds.is_empty()
            && self.themes.is_empty()
            && self.date == DateFilter::Any
    }

    /// Does `entry` pass every active filter?
    pub fn matches(&self, entry: &Entry, now: OffsetDateTime) -> bool {
        let query = self
            .query
            .as_deref()
            .map(|q| q.trim().to_lowercase())
            .unwrap_or_default();

        (query.is_empty() || matches_query(entry, &query))
            && (self.kinds.is_empty() || self.kinds.iter().any(|k| k.matches(entry)))
            && (self.themes.is_empty() || entry.themes().iter().any(|t| self.themes.contains(t)))
            && self.date.matches(entry.created_at, now)
    }

    /// Returns the entries that pass the filter, in their original order.
    pub fn apply(&self, entries: &[Entry], now: OffsetDateTime) -> Vec<Entry> {
        let kept: Vec<Entry> = entries
            .iter()
            .filter(|entry| self.matches(entry, now))
            .cloned()
            .collect();
        tracing::debug!(before = entries.len(), after = kept.len(), "filtered entries");
        kept
    }
}

/// `query` must already be lowercased and trimmed.
fn matches_query(entry: &Entry, query: &str) -> bool {
    if entry.text.to_lowercase().contains(query) {
        return true;
    }
    entry.meta.as_ref().is_some_and(|meta| {
        meta.themes.iter().any(|t| t.to_lowercase().contains(query))
            || meta.summary.to_lowercase().contains(query)
    })
}

/// Drops entries that have no themes and so can never join a cluster.
pub fn only_clustered(entries: Vec<Entry>) -> Vec<Entry> {
    entries
        .into_iter()
        .filter(|entry| !entry.themes().is_empty())
        .collect()
}
