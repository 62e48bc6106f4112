// In crates/api-client/src/auth.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// Access tokens older than this are discarded and re-authorized.
pub const MAX_AUTH_TIME_SECS: i64 = 120 * 60;
/// Access tokens older than this are renewed before use.
pub const MIN_AUTH_RENEW_THRESHOLD_SECS: i64 = 15 * 60;

const KEY_CONSUMER_KEY: &str = "CONSUMER_KEY";
const KEY_CONSUMER_SECRET: &str = "CONSUMER_SECRET";
const KEY_SANDBOX: &str = "SANDBOX";

/// Consumer credentials read from the properties file.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub sandbox: bool,
}

/// The persisted OAuth access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    #[serde(rename = "CONSUMER_KEY")]
    pub consumer_key: String,
    #[serde(rename = "CONSUMER_SECRET")]
    pub consumer_secret: String,
    #[serde(rename = "SANDBOX")]
    pub sandbox: bool,
    /// Unix seconds of the last authorization or renewal.
    pub last_auth_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Missing,
    Expired,
    NeedsRenewal,
    Valid,
}

/// Classifies a token by its age at `now`.
pub fn token_status(token: Option<&AuthToken>, now: i64) -> TokenStatus {
    let Some(token) = token else {
        return TokenStatus::Missing;
    };
    let elapsed = now - token.last_auth_time;
    if elapsed > MAX_AUTH_TIME_SECS {
        TokenStatus::Expired
    } else if elapsed > MIN_AUTH_RENEW_THRESHOLD_SECS {
        TokenStatus::NeedsRenewal
    } else {
        TokenStatus::Valid
    }
}

/// Parses `KEY=VALUE` lines, ignoring `#` comments and malformed lines.
fn parse_properties(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.split('#').next().unwrap_or("").trim();
            let mut parts = line.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(k), Some(v), None) => Some((k.trim().to_string(), v.trim().to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Reads the consumer credentials. A missing key or secret is fatal.
pub fn read_credentials(path: &Path) -> Result<Credentials> {
    let content = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut props = parse_properties(&content);

    let consumer_key = props.remove(KEY_CONSUMER_KEY).ok_or_else(|| {
        Error::Configuration(format!(
            "property '{}' not defined in {}",
            KEY_CONSUMER_KEY,
            path.display()
        ))
    })?;
    let consumer_secret = props.remove(KEY_CONSUMER_SECRET).ok_or_else(|| {
        Error::Configuration(format!(
            "property '{}' not defined in {}",
            KEY_CONSUMER_SECRET,
            path.display()
        ))
    })?;
    let sandbox = props.get(KEY_SANDBOX).map(String::as_str) != Some("0");

    Ok(Credentials {
        consumer_key,
        consumer_secret,
        sandbox,
    })
}

/// Reads the token file. Anything unreadable or incomplete counts as no token.
pub fn read_authtoken(path: &Path) -> Option<AuthToken> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No auth token file.");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Ignoring unusable auth token file."
            );
            None
        }
    }
}

pub fn write_authtoken(path: &Path, token: &AuthToken) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(token)?;
    fs::write(path, json).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
