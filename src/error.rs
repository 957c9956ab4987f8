use thiserror::Error;

use crate::nip05::Nip05Error;
use crate::nostr::RelayError;
use crate::store::StoreError;
use crate::vault::VaultError;
use crate::whitelist::WhitelistError;

/// Application-wide error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("NIP-05 service error: {0}")]
    Nip05(#[from] Nip05Error),

    #[error("Whitelist error: {0}")]
    Whitelist(#[from] WhitelistError),
}

impl AppError {
    /// Whether the error came from a user-initiated unlock that can be retried
    /// with a different password.
    pub fn is_retryable_unlock(&self) -> bool {
        matches!(self, Self::Vault(VaultError::DecryptionFailure))
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
