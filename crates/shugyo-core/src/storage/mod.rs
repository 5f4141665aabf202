mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, HistoryConfig, NotificationsConfig, TimerConfig};
pub use database::Database;

use std::path::PathBuf;

/// Returns `~/.config/shugyo[-dev]/` based on SHUGYO_ENV.
///
/// Set SHUGYO_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SHUGYO_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("shugyo-dev")
    } else {
        base_dir.join("shugyo")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
