use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row, params};
use time::OffsetDateTime;

use crate::db::{from_millis, to_millis};
use crate::{Database, Entry, EntryId, EntryMeta, Reflection, ReflectionId};

/// Settings key holding the user's preferred model.
const SELECTED_MODEL_KEY: &str = "selected_model";

/// How many entries the CLI loads when no limit is given.
pub const DEFAULT_LIST_LIMIT: usize = 60;

/// Service layer over the vault database.
///
/// VaultService owns the Database and is the explicit state container the
/// CLI hands around; the graph and theme functions only ever see the entry
/// lists it returns.
///
/// # Examples
///
/// ```
/// use vaulta::{Database, VaultService};
///
/// # fn main() -> anyhow::Result<()> {
/// let service = VaultService::new(Database::in_memory()?);
/// let entry = service.capture("a lighthouse that keeps the wrong time")?;
/// assert!(entry.is_unfiled());
/// # Ok(())
/// # }
/// ```
pub struct VaultService {
    db: Database,
}

/// Raw entry columns, converted to an `Entry` outside the row callback.
struct EntryRow {
    id: String,
    text: String,
    created_at: i64,
    themes: Option<String>,
    tone: Option<String>,
    kind: Option<String>,
    summary: Option<String>,
}

impl EntryRow {
    const COLUMNS: &'static str = "id, text, created_at, themes, tone, kind, summary";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            text: row.get(1)?,
            created_at: row.get(2)?,
            themes: row.get(3)?,
            tone: row.get(4)?,
            kind: row.get(5)?,
            summary: row.get(6)?,
        })
    }

    fn into_entry(self) -> Result<Entry> {
        let meta = match (self.themes, self.tone, self.kind) {
            (Some(themes), Some(tone), Some(kind)) => Some(EntryMeta {
                themes: serde_json::from_str(&themes)
                    .with_context(|| format!("Corrupt themes for entry {}", self.id))?,
                tone: tone.parse()?,
                kind: kind.parse()?,
                summary: self.summary.unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Entry {
            id: EntryId::new(self.id),
            text: self.text,
            created_at: from_millis(self.created_at)?,
            meta,
        })
    }
}

impl VaultService {
    /// Creates a new VaultService, taking ownership of the database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Captures a new, unanalyzed entry timestamped now.
    ///
    /// # Errors
    ///
    /// Fails if `text` is empty or whitespace-only, or on database errors.
    pub fn capture(&self, text: &str) -> Result<Entry> {
        if text.trim().is_empty() {
            anyhow::bail!("Entry text cannot be empty");
        }

        let entry = Entry {
            id: EntryId::generate(),
            text: text.to_string(),
            created_at: OffsetDateTime::now_utc(),
            meta: None,
        };
        self.insert_entry(&entry)?;
        tracing::info!(id = %entry.id, "captured entry");
        Ok(entry)
    }

    /// Stores a complete entry, metadata included.
    ///
    /// Used by `capture` and by imports or fixtures that carry their own
    /// ids and timestamps. Fails if an entry with the same id exists.
    pub fn insert_entry(&self, entry: &Entry) -> Result<()> {
        let conn = self.db.connection();
        let meta = entry.meta.as_ref();
        let themes = meta.map(|m| serde_json::to_string(&m.themes)).transpose()?;

        conn.execute(
            "INSERT INTO entries (id, text, created_at, themes, tone, kind, summary)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.id.as_str(),
                entry.text,
                to_millis(entry.created_at),
                themes,
                meta.map(|m| m.tone.as_str()),
                meta.map(|m| m.kind.as_str()),
                meta.map(|m| m.summary.as_str()),
            ],
        )
        .with_context(|| format!("Failed to insert entry {}", entry.id))?;
        Ok(())
    }

    /// Retrieves an entry by id. A missing entry is `None`, not an error.
    pub fn get_entry(&self, id: &EntryId) -> Result<Option<Entry>> {
        let conn = self.db.connection();
        let query = format!("SELECT {} FROM entries WHERE id = ?1", EntryRow::COLUMNS);

        let row = conn
            .query_row(&query, [id.as_str()], EntryRow::from_row)
            .optional()?;

        row.map(EntryRow::into_entry).transpose()
    }

    /// Lists entries by creation time.
    ///
    /// Entries created in the same millisecond keep insertion order
    /// (reversed for newest-first).
    pub fn list_entries(&self, options: ListEntriesOptions) -> Result<Vec<Entry>> {
        let conn = self.db.connection();
        let order_clause = match options.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        let limit_clause = match options.limit {
            Some(limit) => format!(" LIMIT {limit}"),
            None => String::new(),
        };
        let query = format!(
            "SELECT {} FROM entries
             ORDER BY created_at {order_clause}, rowid {order_clause}{limit_clause}",
            EntryRow::COLUMNS
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([], EntryRow::from_row)?;

        let mut entries = Vec::new();
        for row_result in rows {
            entries.push(row_result?.into_entry()?);
        }
        Ok(entries)
    }

    /// Lists every entry that has not been analyzed yet, oldest first.
    pub fn unfiled_entries(&self) -> Result<Vec<Entry>> {
        let conn = self.db.connection();
        let query = format!(
            "SELECT {} FROM entries WHERE themes IS NULL ORDER BY created_at ASC, rowid ASC",
            EntryRow::COLUMNS
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([], EntryRow::from_row)?;

        let mut entries = Vec::new();
        for row_result in rows {
            entries.push(row_result?.into_entry()?);
        }
        Ok(entries)
    }

    /// Replaces (or with `None`, clears) an entry's metadata.
    ///
    /// Returns `false` if no entry has the given id.
    pub fn set_meta(
        &self,
        id: &EntryId,
        meta: Option<&EntryMeta>,
        model: Option<&str>,
    ) -> Result<bool> {
        let conn = self.db.connection();
        let themes = meta.map(|m| serde_json::to_string(&m.themes)).transpose()?;
        let analyzed_at = meta.map(|_| to_millis(OffsetDateTime::now_utc()));

        let updated = conn.execute(
            "UPDATE entries
             SET themes = ?1, tone = ?2, kind = ?3, summary = ?4,
                 analyzed_model = ?5, analyzed_at = ?6
             WHERE id = ?7",
            params![
                themes,
                meta.map(|m| m.tone.as_str()),
                meta.map(|m| m.kind.as_str()),
                meta.map(|m| m.summary.as_str()),
                meta.and(model),
                analyzed_at,
                id.as_str(),
            ],
        )?;

        if updated == 0 {
            tracing::warn!(id = %id, "set_meta on unknown entry");
            return Ok(false);
        }
        tracing::info!(id = %id, filed = meta.is_some(), "updated entry metadata");
        Ok(true)
    }

    /// Deletes an entry. Returns `false` if it did not exist.
    pub fn delete_entry(&self, id: &EntryId) -> Result<bool> {
        let deleted = self
            .db
            .connection()
            .execute("DELETE FROM entries WHERE id = ?1", [id.as_str()])?;
        Ok(deleted > 0)
    }

    /// Stores a reflection.
    pub fn save_reflection(&self, reflection: &Reflection) -> Result<()> {
        self.db
            .connection()
            .execute(
                "INSERT OR REPLACE INTO reflections
                 (id, created_at, model, highlights, themes, note, entry_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    reflection.id.as_str(),
                    to_millis(reflection.created_at),
                    reflection.model,
                    serde_json::to_string(&reflection.highlights)?,
                    serde_json::to_string(&reflection.themes)?,
                    reflection.note,
                    reflection.entry_count as i64,
                ],
            )
            .context("Failed to save reflection")?;
        Ok(())
    }

    /// Returns the most recent reflection, if any.
    pub fn latest_reflection(&self) -> Result<Option<Reflection>> {
        Ok(self.query_reflections(Some(1))?.into_iter().next())
    }

    /// Lists all reflections, newest first.
    pub fn list_reflections(&self) -> Result<Vec<Reflection>> {
        self.query_reflections(None)
    }

    fn query_reflections(&self, limit: Option<usize>) -> Result<Vec<Reflection>> {
        let conn = self.db.connection();
        let limit_clause = limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default();
        let query = format!(
            "SELECT id, created_at, model, highlights, themes, note, entry_count
             FROM reflections ORDER BY created_at DESC, rowid DESC{limit_clause}"
        );

        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        let mut reflections = Vec::new();
        for row_result in rows {
            let (id, created_at, model, highlights, themes, note, entry_count) = row_result?;
            reflections.push(Reflection {
                id: ReflectionId::new(id),
                created_at: from_millis(created_at)?,
                model,
                highlights: serde_json::from_str(&highlights)
                    .context("Corrupt reflection highlights")?,
                themes: serde_json::from_str(&themes).context("Corrupt reflection themes")?,
                note,
                entry_count: usize::try_from(entry_count)?,
            });
        }
        Ok(reflections)
    }

    /// Returns the persisted model preference, if one was chosen.
    pub fn selected_model(&self) -> Result<Option<String>> {
        let model = self
            .db
            .connection()
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [SELECTED_MODEL_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(model)
    }

    /// Persists (or with `None`, clears) the model preference.
    pub fn set_selected_model(&self, model: Option<&str>) -> Result<()> {
        let conn = self.db.connection();
        match model {
            Some(model) => conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                [SELECTED_MODEL_KEY, model],
            )?,
            None => conn.execute("DELETE FROM settings WHERE key = ?1", [SELECTED_MODEL_KEY])?,
        };
        Ok(())
    }
}

/// Sort order for listing entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Oldest entries first
    Ascending,
    /// Newest entries first
    #[default]
    Descending,
}

/// Options for listing entries.
///
/// ```
/// use vaulta::ListEntriesOptions;
///
/// // Newest 10 entries
/// let options = ListEntriesOptions {
///     limit: Some(10),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListEntriesOptions {
    /// Maximum number of entries to return. None means no limit.
    pub limit: Option<usize>,
    /// Defaults to newest first.
    pub order: SortOrder,
}

#[cfg(test)]
#[path = "service/tests.rs"]
mod tests;
