//! Credentials file loading
//!
//! The file is a certbot-style INI file of `key = value` lines. Keys may carry
//! the `dns_pektin_` prefix and older camelCase spellings are accepted.

use crate::types::{PektinError, PektinResult};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "dns_pektin_";

/// Recognized credential keys after normalization
pub type CredentialMap = HashMap<String, String>;

/// Load and parse a credentials file, warning when other users can read it
pub fn load_credentials_file(path: &Path) -> PektinResult<CredentialMap> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PektinError::Configuration(format!(
            "Failed to read credentials file {}: {}",
            path.display(),
            e
        ))
    })?;

    check_permissions(path);

    let map = parse_credentials(&content);
    debug!(path = %path.display(), keys = map.len(), "Loaded Pektin credentials file");
    Ok(map)
}

#[cfg(unix)]
fn check_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(metadata) = std::fs::metadata(path) {
        let mode = metadata.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                mode = format!("{:o}", mode),
                "Unsafe permissions on credentials configuration file"
            );
        }
    }
}

#[cfg(not(unix))]
fn check_permissions(_path: &Path) {}

/// Parse `key = value` lines into a map of normalized keys
pub fn parse_credentials(content: &str) -> CredentialMap {
    let mut map = CredentialMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') || line.starts_with('[')
        {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if value.is_empty() {
                continue;
            }
            map.insert(normalize_key(key.trim()), value.to_string());
        }
    }
    map
}

fn normalize_key(key: &str) -> String {
    let key = key.strip_prefix(KEY_PREFIX).unwrap_or(key);
    match key {
        "apiToken" => "api_token",
        "apiEndpoint" | "pektinApiEndpoint" | "pektin_api_endpoint" => "api_endpoint",
        "confidantPassword" => "confidant_password",
        "vaultEndpoint" => "vault_endpoint",
        other => other,
    }
    .to_string()
}
