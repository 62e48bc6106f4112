use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// Reads every file in `dir` and collects its whitespace-separated tokens as
/// ticker symbols, deduplicated and sorted.
pub fn load_symbols(dir: &Path) -> Result<BTreeSet<String>> {
    let entries = fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut symbols = BTreeSet::new();
    for path in entries.filter_map(|e| e.ok().map(|e| e.path())) {
        if !path.is_file() {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(content) => symbols.extend(content.split_whitespace().map(str::to_string)),
            Err(e) => tracing::warn!(
                file = %path.display(),
                error = %e,
                "Could not read symbol file, skipping it."
            ),
        }
    }

    tracing::debug!(dir = %dir.display(), count = symbols.len(), "Loaded symbols.");
    Ok(symbols)
}
