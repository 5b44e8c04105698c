//! OAuth token storage backed by the operating system keychain.
//!
//! Extensions authenticate against third-party services; their tokens are
//! held per provider in the platform credential store (Secret Service on
//! Linux) rather than on disk. Token values are zeroed on drop and never
//! logged.

use std::fmt;

use keyring::Entry;
use thiserror::Error;
use zeroize::Zeroize;

const SERVICE_NAME: &str = "portico";

/// Result type for token storage operations.
pub type SecretsResult<T> = Result<T, SecretsError>;

/// Errors that can occur while accessing the keychain.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// Failed to access the system keychain.
    #[error("Failed to access system keychain: {0}")]
    KeychainAccess(String),

    /// Failed to store a token.
    #[error("Failed to store token: {0}")]
    StoreFailed(String),

    /// Failed to delete a token.
    #[error("Failed to delete token: {0}")]
    DeleteFailed(String),
}

/// A token value that is zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct TokenValue {
    value: String,
}

impl TokenValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenValue([REDACTED])")
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Per-provider OAuth token store.
#[derive(Debug)]
pub struct TokenStore {
    service: String,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    pub fn new() -> Self {
        Self { service: SERVICE_NAME.to_string() }
    }

    /// Store with a custom service name, used by tests to avoid touching
    /// real credentials.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(&self, provider: &str) -> SecretsResult<Entry> {
        Entry::new(&self.service, provider).map_err(|e| SecretsError::KeychainAccess(e.to_string()))
    }

    /// Fetch the stored token for a provider, if any.
    pub fn get(&self, provider: &str) -> SecretsResult<Option<String>> {
        match self.entry(provider)?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SecretsError::KeychainAccess(e.to_string())),
        }
    }

    /// Store or replace the token for a provider.
    pub fn set(&self, provider: &str, token: &str) -> SecretsResult<()> {
        self.entry(provider)?
            .set_password(token)
            .map_err(|e| SecretsError::StoreFailed(e.to_string()))
    }

    /// Remove the token for a provider. Removing an absent token is fine.
    pub fn remove(&self, provider: &str) -> SecretsResult<()> {
        match self.entry(provider)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SecretsError::DeleteFailed(e.to_string())),
        }
    }
}
