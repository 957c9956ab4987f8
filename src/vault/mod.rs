//! Encrypted at-rest storage for the user's private signing key.
//!
//! ## Security Model
//!
//! - The secret is encrypted under a key derived from the user's password
//! - Every envelope carries its own random salt and IV
//! - A failed unlock never says whether the password or the data was wrong
//! - Plaintext and derived keys are zeroized on drop and never logged
//!
//! ## Usage
//!
//! ```ignore
//! let vault = Vault::new(store);
//! vault.save("jp@anmore.me", &SecretMaterial::from(nsec), password).await?;
//!
//! match vault.load("jp@anmore.me", password).await {
//!     Ok(Some(secret)) => { /* sign in */ }
//!     Ok(None) => { /* nothing stored for this identifier */ }
//!     Err(VaultError::DecryptionFailure) => { /* ask again */ }
//!     Err(e) => return Err(e.into()),
//! }
//! ```

pub mod crypto;

pub use crypto::{
    decrypt, derive_key, encrypt, EncryptedEnvelope, SecretMaterial, VaultError, VaultResult,
    PBKDF2_ROUNDS,
};

use crate::store::SharedStore;
use tracing::debug;
use zeroize::Zeroizing;

const STORAGE_NAMESPACE: &str = "vault";

/// Persistence key for an identifier's envelope: `vault:<identifier>`.
pub fn storage_key(identifier: &str) -> String {
    format!("{}:{}", STORAGE_NAMESPACE, identifier)
}

/// Async facade over the envelope primitives and a key/value store.
///
/// Key derivation is CPU-bound, so it runs on the blocking pool.
#[derive(Clone)]
pub struct Vault {
    store: SharedStore,
}

impl Vault {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Encrypt a secret off the async executor.
    pub async fn seal(secret: &SecretMaterial, password: &str) -> VaultResult<EncryptedEnvelope> {
        let secret = secret.clone();
        let password = Zeroizing::new(password.to_string());
        tokio::task::spawn_blocking(move || encrypt(secret.as_bytes(), &password)).await?
    }

    /// Decrypt an envelope off the async executor.
    pub async fn open(envelope: EncryptedEnvelope, password: &str) -> VaultResult<SecretMaterial> {
        let password = Zeroizing::new(password.to_string());
        tokio::task::spawn_blocking(move || decrypt(&envelope, &password)).await?
    }

    /// Encrypt and persist, replacing any previous envelope for `identifier`.
    pub async fn save(
        &self,
        identifier: &str,
        secret: &SecretMaterial,
        password: &str,
    ) -> VaultResult<()> {
        let envelope = Self::seal(secret, password).await?;
        self.store
            .put(&storage_key(identifier), &envelope.encode())
            .await?;
        debug!(identifier, "Stored encrypted secret");
        Ok(())
    }

    /// Load and decrypt. `None` when nothing is stored for `identifier`.
    pub async fn load(&self, identifier: &str, password: &str) -> VaultResult<Option<SecretMaterial>> {
        let Some(encoded) = self.store.get(&storage_key(identifier)).await? else {
            return Ok(None);
        };

        let envelope = EncryptedEnvelope::decode(&encoded)?;
        Self::open(envelope, password).await.map(Some)
    }

    pub async fn exists(&self, identifier: &str) -> VaultResult<bool> {
        Ok(self.store.get(&storage_key(identifier)).await?.is_some())
    }

    pub async fn remove(&self, identifier: &str) -> VaultResult<bool> {
        Ok(self.store.delete(&storage_key(identifier)).await?)
    }
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").finish_non_exhaustive()
    }
}
