// In crates/app-config/src/types.rs

use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_CACHE_DIR: &str = ".answers";
pub const DEFAULT_SECTOR_FILE: &str = "~/.stock_sectors.json";

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// Where the screener keeps its questions, symbols and answers.
    pub screener: ScreenerSettings,
    /// Settings for the brokerage API.
    pub brokerage: BrokerageSettings,
}

impl Settings {
    /// Rejects settings that deserialized fine but cannot work.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("screener.questions_directory", &self.screener.questions_directory),
            ("screener.symbols_directory", &self.screener.symbols_directory),
            ("screener.cache_dir", &self.screener.cache_dir),
            ("brokerage.credentials", &self.brokerage.credentials),
            ("brokerage.authtoken", &self.brokerage.authtoken),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Invalid(format!("'{}' must not be empty", key)));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ScreenerSettings {
    /// Directory holding one `<SYMBOL>.json` answer file per symbol.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    /// Directory of question section files (`*.json`).
    pub questions_directory: String,
    /// Directory of plain-text symbol lists.
    pub symbols_directory: String,
    /// The uuid of the sector-selection question, used to tag quotes.
    #[serde(default)]
    pub sector_question_id: Option<String>,
    /// Shared sector list used when a sector question does not name its own.
    #[serde(default = "default_sector_file")]
    pub sector_file: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BrokerageSettings {
    /// Properties file with `CONSUMER_KEY`, `CONSUMER_SECRET` and `SANDBOX`.
    pub credentials: String,
    /// JSON file where the OAuth access token is persisted.
    pub authtoken: String,
    /// Overrides the REST base URL (production or sandbox by default).
    #[serde(default)]
    pub rest_base_url: Option<String>,
    /// Overrides the OAuth base URL.
    #[serde(default)]
    pub oauth_base_url: Option<String>,
    /// Overrides the page users visit to authorize a request token.
    #[serde(default)]
    pub authorize_url: Option<String>,
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

fn default_sector_file() -> String {
    DEFAULT_SECTOR_FILE.to_string()
}
