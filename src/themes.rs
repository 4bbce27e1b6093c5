//! Theme frequency aggregation for theme pickers and filters.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::Entry;

/// How many themes a picker shows before "more themes".
pub const DEFAULT_TOP_THEMES: usize = 8;

/// Number of entries carrying a theme label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeCount {
    pub theme: String,
    pub count: usize,
}

impl ThemeCount {
    pub fn new(theme: impl Into<String>, count: usize) -> Self {
        Self {
            theme: theme.into(),
            count,
        }
    }
}

/// Counts, for each theme, how many entries carry it.
///
/// An entry contributes at most once per distinct label. The result is
/// sorted by count descending, then theme ascending, so it does not depend
/// on input order.
///
/// ```
/// use vaulta::EntryBuilder;
/// use vaulta::themes::{theme_counts, ThemeCount};
///
/// let entries = vec![
///     EntryBuilder::new().id("a").themes(["x", "y"]).build(),
///     EntryBuilder::new().id("b").themes(["x"]).build(),
/// ];
///
/// assert_eq!(
///     theme_counts(&entries),
///     vec![ThemeCount::new("x", 2), ThemeCount::new("y", 1)]
/// );
/// ```
pub fn theme_counts(entries: &[Entry]) -> Vec<ThemeCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in entries {
        let distinct: HashSet<&str> = entry.themes().iter().map(String::as_str).collect();
        for theme in distinct {
            *counts.entry(theme).or_default() += 1;
        }
    }

    let mut ranked: Vec<ThemeCount> = counts
        .into_iter()
        .map(|(theme, count)| ThemeCount::new(theme, count))
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.theme.cmp(&b.theme)));
    ranked
}

/// The first `n` themes of an already ranked list.
pub fn top_themes(counts: &[ThemeCount], n: usize) -> &[ThemeCount] {
    &counts[..n.min(counts.len())]
}

/// Themes whose label contains `query`, case-insensitively, in ranked order.
///
/// An empty query matches everything. Whitespace in the query is matched
/// literally.
pub fn search_themes<'a>(counts: &'a [ThemeCount], query: &str) -> Vec<&'a ThemeCount> {
    let needle = query.to_lowercase();
    counts
        .iter()
        .filter(|tc| tc.theme.to_lowercase().contains(&needle))
        .collect()
}
