//! Credential Store
//!
//! A single JSON file holding the cached token.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{CredentialError, Token};

/// File-backed token cache
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached token. A missing or malformed file is `NotFound`.
    pub fn load(&self) -> Result<Token, CredentialError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No credential cache at {}", self.path.display());
                return Err(CredentialError::NotFound);
            }
            Err(e) => {
                warn!("Failed to read credential cache {}: {}", self.path.display(), e);
                return Err(CredentialError::NotFound);
            }
        };

        match serde_json::from_slice::<Token>(&data) {
            Ok(token) => {
                debug!("Loaded cached credentials from {}", self.path.display());
                Ok(token)
            }
            Err(e) => {
                warn!(
                    "Ignoring malformed credential cache {}: {}",
                    self.path.display(),
                    e
                );
                Err(CredentialError::NotFound)
            }
        }
    }

    /// Serialize the token and write it to disk
    pub fn persist(&self, token: &Token) -> Result<(), CredentialError> {
        let data = serde_json::to_vec(token)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, data)?;
        info!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}
