//! Credential Types

use std::io;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cached authentication artifact used to dial upstream servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absent expiry means the token does not expire
    #[serde(default, with = "humantime_serde")]
    pub expiry: Option<SystemTime>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    /// Create a token valid for `lifetime` from now
    pub fn issued_now(access_token: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token: None,
            expiry: Some(SystemTime::now() + lifetime),
        }
    }

    /// Whether the token has passed its expiry
    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => SystemTime::now() >= expiry,
            None => false,
        }
    }

    /// A token is usable when it carries an access token and has not expired
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }
}

/// Credential acquisition and persistence failures
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No cached token, or the cache could not be parsed
    #[error("no cached credentials")]
    NotFound,

    /// The token can no longer be renewed; interactive login is required
    #[error("credentials expired and cannot be renewed")]
    Expired,

    #[error("login aborted: {0}")]
    Aborted(String),

    #[error("login rejected: {0}")]
    Rejected(String),

    #[error("credential I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("credential serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
