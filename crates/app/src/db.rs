//! SQLite url handling for the binary.

use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// Turns a bare path or `sqlite:` url into an absolute `sqlite://` url.
/// In-memory urls pass through.
///
/// # Errors
///
/// Returns `ConfigError::InvalidDbUrl` for a blank value.
pub fn normalize_sqlite_url(raw: String) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidDbUrl(raw));
    }
    if trimmed.starts_with("sqlite::memory:")
        || trimmed.starts_with("sqlite://")
        || trimmed.contains("mode=memory")
    {
        return Ok(trimmed.to_owned());
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    Ok(format!("sqlite://{}", absolute.display()))
}

/// Creates the database file and its parent directory so `SQLite` can open it.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> std::io::Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Ok(());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}
