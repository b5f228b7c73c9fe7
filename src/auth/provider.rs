//! Authentication Providers
//!
//! The interactive login flow and token renewal live behind `AuthProvider`
//! so the relay does not depend on any one identity service.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{CredentialError, Token};

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Run an interactive or out-of-band login and return a fresh token
    async fn obtain_interactive(&self) -> Result<Token, CredentialError>;

    /// Validate or renew a token. `CredentialError::Expired` means the
    /// caller must fall back to `obtain_interactive`.
    async fn refresh(&self, token: &Token) -> Result<Token, CredentialError>;
}

/// Operator-driven login: prints a prompt and reads a token from a line of
/// input. Tokens it issues are valid for a fixed lifetime.
pub struct ConsoleAuthProvider<R = BufReader<Stdin>> {
    input: Mutex<R>,
    lifetime: Duration,
}

impl ConsoleAuthProvider {
    /// Provider reading from the process's standard input
    pub fn stdin(lifetime: Duration) -> Self {
        Self::with_reader(BufReader::new(tokio::io::stdin()), lifetime)
    }
}

impl<R> ConsoleAuthProvider<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn with_reader(input: R, lifetime: Duration) -> Self {
        Self {
            input: Mutex::new(input),
            lifetime,
        }
    }
}

#[async_trait]
impl<R> AuthProvider for ConsoleAuthProvider<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn obtain_interactive(&self) -> Result<Token, CredentialError> {
        info!("Authentication required: paste an access token and press enter");

        let mut line = String::new();
        let read = self.input.lock().await.read_line(&mut line).await?;
        if read == 0 {
            return Err(CredentialError::Aborted("input closed".to_string()));
        }

        let access_token = line.trim();
        if access_token.is_empty() {
            return Err(CredentialError::Aborted("no token entered".to_string()));
        }
        if access_token.chars().any(char::is_whitespace) {
            return Err(CredentialError::Rejected(
                "token must not contain whitespace".to_string(),
            ));
        }

        debug!("Interactive login produced a token valid for {:?}", self.lifetime);
        Ok(Token::issued_now(access_token, self.lifetime))
    }

    async fn refresh(&self, token: &Token) -> Result<Token, CredentialError> {
        if token.is_valid() {
            Ok(token.clone())
        } else {
            Err(CredentialError::Expired)
        }
    }
}
