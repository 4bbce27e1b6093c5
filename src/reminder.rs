//! A single, low-key nudge derived from the state of the vault.

use std::collections::{HashMap, HashSet};

use time::{Duration, OffsetDateTime};

use crate::models::{Entry, Reflection};

const UNFILED_MIN_ENTRIES: usize = 5;
const UNFILED_MIN_COUNT: usize = 3;
const REFLECTION_STALE_AFTER: Duration = Duration::days(9);
const RETURNING_THEME_MIN_ENTRIES: usize = 4;

/// Picks at most one reminder to show.
///
/// Rules are checked in order and the first one that fires wins:
///
/// 1. at least five entries, three or more of them unfiled;
/// 2. the latest reflection is nine or more days old;
/// 3. some theme appears on four or more distinct entries.
///
/// An empty vault never gets a reminder. With no reflection at all the
/// second rule is skipped.
pub fn gentle_reminder(
    entries: &[Entry],
    latest_reflection: Option<&Reflection>,
    now: OffsetDateTime,
) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    if entries.len() >= UNFILED_MIN_ENTRIES {
        let unfiled = entries.iter().filter(|e| e.is_unfiled()).count();
        if unfiled >= UNFILED_MIN_COUNT {
            return Some(format!("{unfiled} fragments are still unfiled."));
        }
    }

    if latest_reflection.is_some_and(|r| now - r.created_at >= REFLECTION_STALE_AFTER) {
        return Some("You haven't reflected in a while.".to_string());
    }

    let mut theme_entries: HashMap<&str, HashSet<&str>> = HashMap::new();
    for entry in entries {
        for theme in entry.themes() {
            theme_entries
                .entry(theme.as_str())
                .or_default()
                .insert(entry.id.as_str());
        }
    }
    if theme_entries
        .values()
        .any(|ids| ids.len() >= RETURNING_THEME_MIN_ENTRIES)
    {
        return Some("This theme keeps returning.".to_string());
    }

    None
}
