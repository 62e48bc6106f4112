// In crates/screening/src/sectors.rs

use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// Reads the shared sector list. A missing or corrupt file is an empty list.
pub fn load_sectors(path: &Path) -> Vec<String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No sector list yet.");
            return Vec::new();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(
            path = %path.display(),
            error = %e,
            "Sector list is corrupt, starting a new one."
        );
        Vec::new()
    })
}

pub fn save_sectors(path: &Path, sectors: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(sectors)?;
    fs::write(path, json).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
