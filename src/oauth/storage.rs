//! Token cache
//!
//! Persists the current access token to disk so that consecutive CLI
//! invocations can skip the identity provider round-trip.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Cached access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer token
    pub access_token: String,

    /// Expiration time (Unix timestamp, seconds)
    pub expires_at: u64,
}

/// Current Unix time in seconds
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl TokenRecord {
    /// Create a record expiring at the given Unix timestamp
    pub fn new(access_token: impl Into<String>, expires_at: u64) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Whether the token may still be sent
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && unix_now() < self.expires_at
    }

    /// Seconds left before expiry, zero once expired
    pub fn remaining_secs(&self) -> u64 {
        self.expires_at.saturating_sub(unix_now())
    }
}

/// Single-record token cache backed by a JSON file
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store at the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store in the default location (`<cache dir>/oac-client/oac_token.json`)
    pub fn default_location() -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Config("Cannot determine cache directory".to_string()))?;

        Ok(Self::new(cache_dir.join("oac-client").join("oac_token.json")))
    }

    /// Path of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token, if present and not expired
    pub fn load(&self) -> Option<TokenRecord> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No cached token");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read token cache");
                return None;
            }
        };

        let record = match serde_json::from_str::<TokenRecord>(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring malformed token cache");
                return None;
            }
        };

        if record.is_valid() {
            info!(expires_in = record.remaining_secs(), "Loaded cached token");
            Some(record)
        } else {
            debug!(expires_at = record.expires_at, "Cached token is expired");
            None
        }
    }

    /// Write the record, replacing any previous cache file
    pub fn save(&self, record: &TokenRecord) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let content = serde_json::to_vec(record)?;

        // NamedTempFile is created 0600 on Unix; the rename keeps readers
        // from ever seeing a partial file.
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&content)?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %self.path.display(), "Saved token cache");
        Ok(())
    }
}
