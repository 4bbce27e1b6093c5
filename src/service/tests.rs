use super::*;
use crate::{EntryBuilder, EntryKind, Tone};
use time::Duration;
use time::macros::datetime;

fn service() -> VaultService {
    VaultService::new(Database::in_memory().expect("failed to create in-memory database"))
}

fn meta(themes: &[&str]) -> EntryMeta {
    EntryMeta::new(
        themes.iter().map(|t| t.to_string()).collect(),
        Tone::Curious,
        EntryKind::Story,
        "A short summary.",
    )
}

#[test]
fn service_construction_initializes_schema() {
    let service = service();
    let count: i64 = service
        .database()
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
            [],
            |row| row.get(0),
        )
        .expect("failed to query schema");

    assert!(count >= 3, "expected entries, reflections and settings tables");
}

#[test]
fn list_entries_options_default_is_unbounded_newest_first() {
    let options = ListEntriesOptions::default();
    assert_eq!(options.limit, None);
    assert_eq!(options.order, SortOrder::Descending);
}

// --- Capture ---

#[test]
fn capture_returns_unfiled_entry_with_fresh_id() {
    let service = service();

    let entry = service.capture("a map of places I've dreamed").unwrap();

    assert_eq!(entry.text, "a map of places I've dreamed");
    assert!(entry.is_unfiled());
    assert_eq!(entry.id.as_str().len(), 36);
}

#[test]
fn capture_persists_entry() {
    let service = service();
    let entry = service.capture("persist me").unwrap();

    let loaded = service.get_entry(&entry.id).unwrap().expect("entry should exist");

    assert_eq!(loaded.text, "persist me");
    assert_eq!(loaded.meta, None);
    // stored at millisecond precision
    assert_eq!(to_millis(loaded.created_at), to_millis(entry.created_at));
}

#[test]
fn capture_rejects_empty_text() {
    let service = service();

    let err = service.capture("   \n\t ").unwrap_err();

    assert!(err.to_string().contains("cannot be empty"));
    assert!(service.list_entries(ListEntriesOptions::default()).unwrap().is_empty());
}

#[test]
fn get_entry_returns_none_for_unknown_id() {
    let service = service();
    assert_eq!(service.get_entry(&EntryId::new("missing")).unwrap(), None);
}

#[test]
fn insert_entry_rejects_duplicate_ids() {
    let service = service();
    let entry = EntryBuilder::new().id("dup").text("one").build();

    service.insert_entry(&entry).unwrap();
    assert!(service.insert_entry(&entry).is_err());
}

#[test]
fn insert_entry_preserves_metadata() {
    let service = service();
    let entry = EntryBuilder::new()
        .id("with-meta")
        .text("robots tending a garden")
        .created_at(datetime!(2024-02-02 02:02:02 UTC))
        .meta(meta(&["robots", "gardens"]))
        .build();

    service.insert_entry(&entry).unwrap();

    assert_eq!(service.get_entry(&entry.id).unwrap(), Some(entry));
}

// --- Listing ---

fn seed_timeline(service: &VaultService) {
    let base = datetime!(2024-01-01 00:00 UTC);
    for (i, id) in ["first", "second", "third", "fourth"].iter().enumerate() {
        let entry = EntryBuilder::new()
            .id(*id)
            .text(format!("{id} entry"))
            .created_at(base + Duration::days(i as i64))
            .build();
        service.insert_entry(&entry).unwrap();
    }
}

fn ids(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.id.as_str()).collect()
}

#[test]
fn list_entries_defaults_to_newest_first() {
    let service = service();
    seed_timeline(&service);

    let entries = service.list_entries(ListEntriesOptions::default()).unwrap();

    assert_eq!(ids(&entries), vec!["fourth", "third", "second", "first"]);
}

#[test]
fn list_entries_respects_limit() {
    let service = service();
    seed_timeline(&service);

    let entries = service
        .list_entries(ListEntriesOptions {
            limit: Some(2),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(ids(&entries), vec!["fourth", "third"]);
}

#[test]
fn list_entries_ascending() {
    let service = service();
    seed_timeline(&service);

    let entries = service
        .list_entries(ListEntriesOptions {
            limit: None,
            order: SortOrder::Ascending,
        })
        .unwrap();

    assert_eq!(ids(&entries), vec!["first", "second", "third", "fourth"]);
}

#[test]
fn list_entries_breaks_timestamp_ties_by_insertion_order() {
    let service = service();
    let at = datetime!(2024-01-01 00:00 UTC);
    for id in ["a", "b", "c"] {
        service
            .insert_entry(&EntryBuilder::new().id(id).text(id).created_at(at).build())
            .unwrap();
    }

    let entries = service.list_entries(ListEntriesOptions::default()).unwrap();

    assert_eq!(ids(&entries), vec!["c", "b", "a"]);
}

#[test]
fn unfiled_entries_lists_only_unanalyzed_oldest_first() {
    let service = service();
    seed_timeline(&service);
    service
        .set_meta(&EntryId::new("second"), Some(&meta(&["x"])), Some("m"))
        .unwrap();

    let unfiled = service.unfiled_entries().unwrap();

    assert_eq!(ids(&unfiled), vec!["first", "third", "fourth"]);
}

// --- Metadata ---

#[test]
fn set_meta_attaches_metadata() {
    let service = service();
    let entry = service.capture("clockwork birds").unwrap();
    let meta = meta(&["clockwork", "birds"]);

    let updated = service
        .set_meta(&entry.id, Some(&meta), Some("llama3.1:latest"))
        .unwrap();

    assert!(updated);
    let loaded = service.get_entry(&entry.id).unwrap().unwrap();
    assert_eq!(loaded.meta, Some(meta));
    assert_eq!(loaded.themes(), ["clockwork", "birds"]);

    let model: Option<String> = service
        .database()
        .connection()
        .query_row(
            "SELECT analyzed_model FROM entries WHERE id = ?1",
            [entry.id.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(model.as_deref(), Some("llama3.1:latest"));
}

#[test]
fn set_meta_with_none_clears_metadata() {
    let service = service();
    let entry = service.capture("to be unfiled").unwrap();
    service
        .set_meta(&entry.id, Some(&meta(&["x"])), Some("m"))
        .unwrap();

    service.set_meta(&entry.id, None, None).unwrap();

    let loaded = service.get_entry(&entry.id).unwrap().unwrap();
    assert!(loaded.is_unfiled());
}

#[test]
fn set_meta_on_unknown_entry_is_a_no_op() {
    let service = service();
    let updated = service
        .set_meta(&EntryId::new("ghost"), Some(&meta(&["x"])), None)
        .unwrap();
    assert!(!updated);
}

#[test]
fn empty_theme_list_roundtrips_as_filed_entry() {
    let service = service();
    let entry = service.capture("nothing to cluster").unwrap();

    service.set_meta(&entry.id, Some(&meta(&[])), None).unwrap();

    let loaded = service.get_entry(&entry.id).unwrap().unwrap();
    assert!(!loaded.is_unfiled());
    assert!(loaded.themes().is_empty());
}

#[test]
fn delete_entry_removes_it() {
    let service = service();
    let entry = service.capture("short-lived").unwrap();

    assert!(service.delete_entry(&entry.id).unwrap());
    assert!(!service.delete_entry(&entry.id).unwrap());
    assert_eq!(service.get_entry(&entry.id).unwrap(), None);
}

// --- Reflections ---

fn reflection(id: &str, at: OffsetDateTime) -> Reflection {
    Reflection {
        id: ReflectionId::new(id),
        created_at: at,
        model: "test-model".to_string(),
        highlights: vec!["one".to_string(), "two".to_string()],
        themes: vec!["rivers".to_string()],
        note: "Water everywhere.".to_string(),
        entry_count: 3,
    }
}

#[test]
fn latest_reflection_is_none_when_empty() {
    assert_eq!(service().latest_reflection().unwrap(), None);
}

#[test]
fn latest_reflection_returns_newest() {
    let service = service();
    let older = reflection("old", datetime!(2024-01-01 00:00 UTC));
    let newer = reflection("new", datetime!(2024-01-08 00:00 UTC));
    service.save_reflection(&newer).unwrap();
    service.save_reflection(&older).unwrap();

    assert_eq!(service.latest_reflection().unwrap(), Some(newer.clone()));
    assert_eq!(service.list_reflections().unwrap(), vec![newer, older]);
}

// --- Settings ---

#[test]
fn selected_model_roundtrips_and_clears() {
    let service = service();
    assert_eq!(service.selected_model().unwrap(), None);

    service.set_selected_model(Some("gemma3:4b")).unwrap();
    service.set_selected_model(Some("llama3.1:latest")).unwrap();
    assert_eq!(
        service.selected_model().unwrap().as_deref(),
        Some("llama3.1:latest")
    );

    service.set_selected_model(None).unwrap();
    assert_eq!(service.selected_model().unwrap(), None);
}
