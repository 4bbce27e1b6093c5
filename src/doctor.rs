//! Health check and maintenance utilities for vaulta.
//!
//! Provides the `doctor` command functionality:
//! - System health checks (database, Ollama)
//! - Entry statistics and analysis status
//! - Backfill of metadata for unfiled entries

use std::io::{self, Write};

use anyhow::Result;

use crate::VaultService;
use crate::analyzer::EntryAnalyzer;
use crate::models::EntryId;
use crate::ollama::OllamaClient;

// ANSI color codes for terminal output
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

/// Health status for a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Component is healthy
    Ok,
    /// Component has a warning but is functional
    Warning(String),
    /// Component is not functional
    Error(String),
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }
}

#[derive(Debug)]
pub struct DatabaseHealth {
    pub status: HealthStatus,
    pub file_path: String,
}

#[derive(Debug)]
pub struct OllamaHealth {
    pub status: HealthStatus,
    pub base_url: String,
    pub models: Vec<String>,
}

/// Entry statistics for doctor output.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct VaultStats {
    pub total_entries: i64,
    pub analyzed_entries: i64,
    pub unfiled_entries: i64,
    /// Analyzed entries with at least one theme, i.e. graph nodes.
    pub themed_entries: i64,
    pub distinct_themes: i64,
    pub reflections: i64,
}

/// Outcome of a backfill run.
#[derive(Debug, Default)]
pub struct BackfillResult {
    pub analyzed_count: usize,
    pub errors: Vec<String>,
}

// ============================================================================
// Health Check Functions
// ============================================================================

/// Performs all health checks and prints results.
pub fn run_health_checks(
    db_path: &str,
    service: &VaultService,
    client: &OllamaClient,
) -> Result<()> {
    let db_health = check_database_health(db_path, service);
    let ollama_health = check_ollama_health(client);
    let stats = get_vault_stats(service)?;

    print_health_report(&db_health, &ollama_health, &stats);

    Ok(())
}

pub fn check_database_health(db_path: &str, service: &VaultService) -> DatabaseHealth {
    let conn = service.database().connection();
    let status = match conn.query_row("SELECT 1", [], |_| Ok(())) {
        Ok(()) => HealthStatus::Ok,
        Err(e) => HealthStatus::Error(format!("Connection test failed: {e}")),
    };

    DatabaseHealth {
        status,
        file_path: db_path.to_string(),
    }
}

pub fn check_ollama_health(client: &OllamaClient) -> OllamaHealth {
    let base_url = client.base_url().to_string();

    match client.list_models() {
        Ok(models) => OllamaHealth {
            status: if models.is_empty() {
                HealthStatus::Warning("No models installed".to_string())
            } else if !models.iter().any(|m| m == client.model()) {
                HealthStatus::Warning(format!("Model '{}' is not installed", client.model()))
            } else {
                HealthStatus::Ok
            },
            base_url,
            models,
        },
        Err(e) => OllamaHealth {
            status: HealthStatus::Error(format!("Connection failed: {e}")),
            base_url,
            models: Vec::new(),
        },
    }
}

pub fn get_vault_stats(service: &VaultService) -> Result<VaultStats> {
    let conn = service.database().connection();

    let total_entries: i64 =
        conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;

    let analyzed_entries: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE themes IS NOT NULL",
        [],
        |row| row.get(0),
    )?;

    let themed_entries: i64 = conn.query_row(
        "SELECT COUNT(*) FROM entries WHERE themes IS NOT NULL AND json_array_length(themes) > 0",
        [],
        |row| row.get(0),
    )?;

    let distinct_themes: i64 = conn.query_row(
        "SELECT COUNT(DISTINCT t.value)
         FROM entries e, json_each(e.themes) t
         WHERE e.themes IS NOT NULL",
        [],
        |row| row.get(0),
    )?;

    let reflections: i64 =
        conn.query_row("SELECT COUNT(*) FROM reflections", [], |row| row.get(0))?;

    Ok(VaultStats {
        total_entries,
        analyzed_entries,
        unfiled_entries: total_entries - analyzed_entries,
        themed_entries,
        distinct_themes,
        reflections,
    })
}

// ============================================================================
// Pretty Printing
// ============================================================================

fn status_symbol(status: &HealthStatus) -> &'static str {
    match status {
        HealthStatus::Ok => "\u{2713}",
        HealthStatus::Warning(_) => "!",
        HealthStatus::Error(_) => "\u{2717}",
    }
}

fn status_color(status: &HealthStatus) -> &'static str {
    match status {
        HealthStatus::Ok => GREEN,
        HealthStatus::Warning(_) => YELLOW,
        HealthStatus::Error(_) => RED,
    }
}

fn print_health_report(db: &DatabaseHealth, ollama: &OllamaHealth, stats: &VaultStats) {
    println!("{BOLD}vaulta doctor{RESET}");
    println!();

    println!("{BOLD}Database{RESET}");
    println!(
        "  {}{}{RESET} Connection: {}",
        status_color(&db.status),
        status_symbol(&db.status),
        if db.status.is_ok() { "OK" } else { "FAILED" }
    );
    println!("    {DIM}Path: {}{RESET}", db.file_path);
    println!();

    println!("{BOLD}Ollama{RESET}");
    let status_text = match &ollama.status {
        HealthStatus::Ok => "Connected".to_string(),
        HealthStatus::Warning(w) => w.clone(),
        HealthStatus::Error(e) => e.clone(),
    };
    println!(
        "  {}{}{RESET} Status: {status_text}",
        status_color(&ollama.status),
        status_symbol(&ollama.status),
    );
    println!("    {DIM}URL: {}{RESET}", ollama.base_url);
    if !ollama.models.is_empty() {
        let models_display = if ollama.models.len() > 3 {
            format!(
                "{}, ... ({} more)",
                ollama.models[..3].join(", "),
                ollama.models.len() - 3
            )
        } else {
            ollama.models.join(", ")
        };
        println!("    {DIM}Models: {models_display}{RESET}");
    }
    println!();

    println!("{BOLD}Statistics{RESET}");
    println!("  Fragments:   {:>6} total", stats.total_entries);
    if stats.total_entries > 0 {
        println!(
            "               {:>6} analyzed  {:>6} unfiled",
            stats.analyzed_entries, stats.unfiled_entries
        );
        println!("               {:>6} in graph", stats.themed_entries);
    }
    println!("  Themes:      {:>6}", stats.distinct_themes);
    println!("  Reflections: {:>6}", stats.reflections);
}

// ============================================================================
// Backfill Functions
// ============================================================================

/// Lists unfiled entries as `(id, preview)` pairs, oldest first.
pub fn create_backfill_plan(service: &VaultService) -> Result<Vec<(EntryId, String)>> {
    Ok(service
        .unfiled_entries()?
        .into_iter()
        .map(|entry| {
            let preview: String = entry.text.chars().take(50).collect();
            (entry.id, preview.replace('\n', " "))
        })
        .collect())
}

pub fn print_backfill_plan(plan: &[(EntryId, String)]) {
    println!("{BOLD}Backfill Plan{RESET}");
    println!();
    println!("Fragments to analyze: {BOLD}{}{RESET}", plan.len());
    for (id, preview) in plan.iter().take(5) {
        println!("  {DIM}{id}{RESET}: {preview}...");
    }
    if plan.len() > 5 {
        println!("  {DIM}... and {} more{RESET}", plan.len() - 5);
    }
}

/// Prompts user for confirmation.
pub fn confirm_backfill() -> bool {
    print!("\nProceed with backfill? [y/N] ");
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Analyzes every entry in `plan` and stores the metadata.
///
/// A failure on one entry is recorded in the result and the run moves on
/// to the next entry.
pub fn execute_backfill(
    service: &VaultService,
    analyzer: &EntryAnalyzer,
    model: &str,
    plan: &[(EntryId, String)],
) -> Result<BackfillResult> {
    let mut result = BackfillResult::default();

    println!("Using model: {BOLD}{model}{RESET}");
    println!();

    for (i, (entry_id, _)) in plan.iter().enumerate() {
        print!("  [{}/{}] {entry_id}... ", i + 1, plan.len());
        io::stdout().flush().ok();

        let entry = match service.get_entry(entry_id) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                result.errors.push(format!("{entry_id}: not found"));
                println!("{YELLOW}SKIPPED{RESET}");
                continue;
            }
            Err(e) => {
                result.errors.push(format!("{entry_id}: {e}"));
                println!("{RED}FAILED{RESET}");
                continue;
            }
        };

        let outcome = analyzer
            .analyze(model, &entry.text)
            .map_err(anyhow::Error::from)
            .and_then(|meta| {
                service.set_meta(entry_id, Some(&meta), Some(model))?;
                Ok(meta.themes.len())
            });

        match outcome {
            Ok(themes) => {
                result.analyzed_count += 1;
                println!("{GREEN}OK{RESET} ({themes} themes)");
            }
            Err(e) => {
                tracing::warn!(id = %entry_id, error = %e, "backfill failed for entry");
                result.errors.push(format!("{entry_id}: {e}"));
                println!("{RED}FAILED{RESET}");
            }
        }
    }

    Ok(result)
}

pub fn print_backfill_summary(result: &BackfillResult) {
    println!();
    println!("{BOLD}Backfill Complete{RESET}");
    println!("  Analyzed: {}", result.analyzed_count);

    if !result.errors.is_empty() {
        println!();
        println!("{YELLOW}Errors ({}){RESET}:", result.errors.len());
        for err in result.errors.iter().take(10) {
            println!("  - {err}");
        }
        if result.errors.len() > 10 {
            println!("  ... and {} more", result.errors.len() - 10);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
