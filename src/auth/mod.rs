//! Credential Module
//!
//! Acquires the upstream authentication token once per process, caches it on
//! disk between runs and writes it back on shutdown.

pub mod manager;
pub mod provider;
pub mod store;
pub mod types;

pub use manager::{CredentialManager, PersistGuard};
pub use provider::{AuthProvider, ConsoleAuthProvider};
pub use store::CredentialStore;
pub use types::{CredentialError, Token};
