// In crates/app-config/src/lib.rs

use config::{Config, Environment, File};
use std::path::{Path, PathBuf};

pub mod error;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use types::{BrokerageSettings, ScreenerSettings, Settings};

/// The configuration file used when `-c/--config-file` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "stock_screener.json";

/// Loads the application settings from various sources.
///
/// This function orchestrates the layered configuration loading:
/// 1. Reads the given configuration file (JSON or TOML, picked by extension).
/// 2. Merges settings from environment variables (e.g. `APP_SCREENER__CACHE_DIR=...`).
///
/// A missing file or a missing required key is a fatal configuration error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let settings = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}

/// Expands a leading `~` (and `$VARS`) in a configured path.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).into_owned()),
    }
}
