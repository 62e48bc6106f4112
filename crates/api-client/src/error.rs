// In crates/api-client/src/error.rs

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Brokerage configuration error: {0}")]
    Configuration(String),
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(#[from] serde_json::Error),
    #[error("API error: code {code}, msg: {msg}")]
    ApiError { code: i64, msg: String },
    #[error("symbol {0} is not found")]
    SymbolNotFound(String),
    #[error("could not find option chain for {symbol} expiring {expiration}")]
    OptionChainNotFound { symbol: String, expiration: NaiveDate },
    #[error("No valid access token; run the authorization flow first")]
    NotAuthenticated,
    #[error("OAuth handshake failed: {0}")]
    OAuth(String),
}

pub type Result<T> = std::result::Result<T, Error>;
