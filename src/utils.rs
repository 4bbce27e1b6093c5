//! Shared utility functions for locating the vault and resolving settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::ollama::DEFAULT_MODEL;

/// Environment variable that overrides the database location.
pub const DB_PATH_ENV: &str = "VAULTA_DB";

/// Gets the cross-platform database path.
///
/// `VAULTA_DB` wins when set and non-empty. Otherwise the path is
/// `{data_dir}/vaulta/vault.db` where `data_dir` is:
/// - Linux: `~/.local/share`
/// - macOS: `~/Library/Application Support`
/// - Windows: `C:\Users\<user>\AppData\Roaming`
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn get_database_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(DB_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    let data_dir =
        dirs::data_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine data directory"))?;

    Ok(data_dir.join("vaulta").join("vault.db"))
}

/// Ensures the parent directory of the database file exists.
///
/// Creates the directory structure if it doesn't exist using `create_dir_all`.
///
/// # Errors
///
/// Returns an error if directory creation fails.
pub fn ensure_database_directory(db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }
    Ok(())
}

/// Picks the model to use.
///
/// Precedence: explicit flag, then the model saved with `vaulta model`,
/// then `OLLAMA_MODEL`, then [`DEFAULT_MODEL`]. Blank values are skipped.
pub fn resolve_model(flag: Option<&str>, saved: Option<&str>) -> String {
    let env = std::env::var("OLLAMA_MODEL").ok();
    [flag, saved, env.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MODEL)
        .to_string()
}
