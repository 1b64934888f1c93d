//! Credential storage: one token string on disk.
//!
//! The token is read synchronously before any connection attempt. A missing
//! or empty token means "not authenticated yet" — connection attempts are
//! suppressed entirely rather than retried against an anonymous endpoint.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Read the stored token, if any. Whitespace is trimmed; an empty file
/// counts as no credential.
pub fn read_token(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(raw) => {
            let token = raw.trim();
            if token.is_empty() {
                debug!(path = %path.display(), "token file empty, not authenticated");
                None
            } else {
                Some(token.to_string())
            }
        }
        Err(err) => {
            debug!(path = %path.display(), %err, "no token file, not authenticated");
            None
        }
    }
}

pub fn store_token(path: &Path, token: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(path, token.trim()).with_context(|| format!("writing {}", path.display()))
}

pub fn clear_token(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("removing {}", path.display())),
    }
}
