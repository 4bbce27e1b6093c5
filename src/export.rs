//! Exporting the vault as JSON or Markdown.

use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::Result;
use serde::Serialize;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::db::to_millis;
use crate::models::{Entry, EntryId, EntryMeta, Reflection, ReflectionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

/// JSON export envelope. `exportedAt` is RFC 3339; record timestamps are
/// unix milliseconds.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument<'a> {
    version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    exported_at: OffsetDateTime,
    entries: Vec<ExportedEntry<'a>>,
    reflections: Vec<ExportedReflection<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedEntry<'a> {
    id: &'a EntryId,
    text: &'a str,
    created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    meta: Option<&'a EntryMeta>,
}

impl<'a> From<&'a Entry> for ExportedEntry<'a> {
    fn from(entry: &'a Entry) -> Self {
        Self {
            id: &entry.id,
            text: &entry.text,
            created_at: to_millis(entry.created_at),
            meta: entry.meta.as_ref(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedReflection<'a> {
    id: &'a ReflectionId,
    created_at: i64,
    model: &'a str,
    highlights: &'a [String],
    themes: &'a [String],
    note: &'a str,
    entry_count: usize,
}

impl<'a> From<&'a Reflection> for ExportedReflection<'a> {
    fn from(reflection: &'a Reflection) -> Self {
        Self {
            id: &reflection.id,
            created_at: to_millis(reflection.created_at),
            model: &reflection.model,
            highlights: &reflection.highlights,
            themes: &reflection.themes,
            note: &reflection.note,
            entry_count: reflection.entry_count,
        }
    }
}

/// Renders the whole vault as pretty-printed JSON.
pub fn export_json(
    entries: &[Entry],
    reflections: &[Reflection],
    now: OffsetDateTime,
) -> Result<String> {
    let document = ExportDocument {
        version: env!("CARGO_PKG_VERSION"),
        exported_at: now,
        entries: entries.iter().map(ExportedEntry::from).collect(),
        reflections: reflections.iter().map(ExportedReflection::from).collect(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Renders the vault as a human-readable Markdown document.
///
/// Reflections come first, then fragments, each newest first.
pub fn export_markdown(
    entries: &[Entry],
    reflections: &[Reflection],
    now: OffsetDateTime,
) -> Result<String> {
    let mut md = String::from("# Vaulta Export\n\n");
    writeln!(md, "**Exported at:** {}", format_datetime(now)?)?;
    writeln!(md, "**Version:** {}\n", env!("CARGO_PKG_VERSION"))?;

    md.push_str("---\n\n## Reflections\n\n");
    let mut reflections: Vec<&Reflection> = reflections.iter().collect();
    reflections.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if reflections.is_empty() {
        md.push_str("*No reflections.*\n\n");
    }
    for reflection in reflections {
        writeln!(md, "### {}", format_datetime(reflection.created_at)?)?;
        if !reflection.highlights.is_empty() {
            md.push_str("**Highlights:**\n");
            for highlight in &reflection.highlights {
                writeln!(md, "- {highlight}")?;
            }
        }
        if !reflection.themes.is_empty() {
            writeln!(md, "\n**Themes:** {}", reflection.themes.join(", "))?;
        }
        if !reflection.note.is_empty() {
            writeln!(md, "\n**Note:**\n{}", reflection.note)?;
        }
        md.push('\n');
    }

    md.push_str("---\n\n## Fragments\n\n");
    let mut entries: Vec<&Entry> = entries.iter().collect();
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    if entries.is_empty() {
        md.push_str("*No fragments.*\n\n");
    }
    for entry in entries {
        writeln!(md, "### {}\n", format_datetime(entry.created_at)?)?;
        writeln!(md, "{}\n", entry.text)?;

        if let Some(meta) = &entry.meta {
            let mut parts = vec![
                format!("**Type:** {}", meta.kind),
                format!("**Tone:** {}", meta.tone),
            ];
            if !meta.themes.is_empty() {
                parts.push(format!("**Themes:** {}", meta.themes.join(", ")));
            }
            writeln!(md, "- {}", parts.join(" | "))?;
        }
        md.push('\n');
    }

    Ok(md)
}

fn format_datetime(at: OffsetDateTime) -> Result<String> {
    Ok(at.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute] UTC"
    ))?)
}

/// Default file name for an export made at `now`.
pub fn export_filename(format: ExportFormat, now: OffsetDateTime) -> String {
    format!(
        "vaulta-export-{:04}-{:02}-{:02}.{}",
        now.year(),
        u8::from(now.month()),
        now.day(),
        format.extension()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryBuilder, EntryKind, EntryMeta, ReflectionId, Tone};
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-06-10 12:00 UTC);

    fn sample_entries() -> Vec<Entry> {
        vec![
            EntryBuilder::new()
                .id("old")
                .text("first thought")
                .created_at(datetime!(2024-06-01 09:00 UTC))
                .build(),
            EntryBuilder::new()
                .id("new")
                .text("second thought")
                .created_at(datetime!(2024-06-09 18:30 UTC))
                .meta(EntryMeta::new(
                    vec!["maps".to_string(), "tides".to_string()],
                    Tone::Curious,
                    EntryKind::Game,
                    "A map game.",
                ))
                .build(),
        ]
    }

    fn sample_reflection() -> Reflection {
        Reflection {
            id: ReflectionId::new("r1"),
            created_at: datetime!(2024-06-08 07:15 UTC),
            model: "m".to_string(),
            highlights: vec!["maps everywhere".to_string()],
            themes: vec!["maps".to_string()],
            note: "A quiet week.".to_string(),
            entry_count: 2,
        }
    }

    #[test]
    fn format_parses_aliases() {
        assert_eq!("JSON".parse::<ExportFormat>(), Ok(ExportFormat::Json));
        assert_eq!("md".parse::<ExportFormat>(), Ok(ExportFormat::Markdown));
        assert!("csv".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn filename_uses_date_and_extension() {
        assert_eq!(
            export_filename(ExportFormat::Json, NOW),
            "vaulta-export-2024-06-10.json"
        );
        assert_eq!(
            export_filename(ExportFormat::Markdown, NOW),
            "vaulta-export-2024-06-10.md"
        );
    }

    #[test]
    fn json_export_has_envelope() {
        let json = export_json(&sample_entries(), &[sample_reflection()], NOW).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(value["exportedAt"], "2024-06-10T12:00:00Z");
        assert_eq!(value["entries"].as_array().unwrap().len(), 2);
        assert_eq!(value["entries"][1]["meta"]["type"], "game");
        assert!(value["entries"][0].get("meta").is_none());
        // 2024-06-01T09:00:00Z and 2024-06-08T07:15:00Z in unix milliseconds.
        assert_eq!(value["entries"][0]["createdAt"], 1_717_232_400_000_i64);
        assert_eq!(value["reflections"][0]["createdAt"], 1_717_830_900_000_i64);
        assert_eq!(value["reflections"][0]["entryCount"], 2);
    }

    #[test]
    fn markdown_export_of_empty_vault_has_placeholders() {
        let md = export_markdown(&[], &[], NOW).unwrap();

        assert!(md.starts_with("# Vaulta Export\n\n**Exported at:** 2024-06-10 12:00 UTC\n"));
        assert!(md.contains("## Reflections\n\n*No reflections.*"));
        assert!(md.contains("## Fragments\n\n*No fragments.*"));
    }

    #[test]
    fn markdown_export_lists_newest_first_with_meta_line() {
        let md = export_markdown(&sample_entries(), &[sample_reflection()], NOW).unwrap();

        let newer = md.find("second thought").unwrap();
        let older = md.find("first thought").unwrap();
        assert!(newer < older);

        assert!(md.contains("### 2024-06-09 18:30 UTC\n\nsecond thought\n\n"));
        assert!(md.contains("- **Type:** game | **Tone:** curious | **Themes:** maps, tides\n"));
        assert!(md.contains("**Highlights:**\n- maps everywhere\n"));
        assert!(md.contains("**Note:**\nA quiet week.\n"));
        assert!(!md.contains("*No fragments.*"));
    }

    #[test]
    fn unfiled_entry_has_no_meta_line() {
        let entries = vec![sample_entries().remove(0)];
        let md = export_markdown(&entries, &[], NOW).unwrap();

        assert!(!md.contains("**Type:**"));
    }
}
