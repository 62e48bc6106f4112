// In crates/screening/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize answers: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output file {0} already exists, refusing to overwrite it")]
    OutputExists(PathBuf),

    #[error("Input closed while waiting for an answer")]
    InputClosed,

    #[error("Console I/O failed: {0}")]
    Console(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
