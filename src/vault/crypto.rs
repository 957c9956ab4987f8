//! Password-based authenticated encryption for secrets at rest.
//!
//! Uses:
//! - PBKDF2-HMAC-SHA256 (100 000 rounds) for key derivation
//! - AES-256-GCM with a 128-bit tag for authenticated encryption
//!
//! Envelope layout: `salt (16) || iv (12) || ciphertext || tag (16)`,
//! transported as standard base64.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::store::StoreError;

/// PBKDF2 iteration count. Changing this breaks every stored envelope.
pub const PBKDF2_ROUNDS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

/// Vault errors.
///
/// Every way an envelope can fail to open collapses into
/// [`VaultError::DecryptionFailure`].
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Failed to decrypt: invalid password or corrupted data")]
    DecryptionFailure,

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Vault storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Vault worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Plaintext secret bytes. Wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretMaterial(Zeroizing<Vec<u8>>);

impl SecretMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The secret as UTF-8 text, if it is.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SecretMaterial {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for SecretMaterial {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretMaterial(<redacted>)")
    }
}

/// Salt, IV and authenticated ciphertext produced by [`encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub salt: [u8; SALT_LEN],
    pub iv: [u8; IV_LEN],
    /// Ciphertext with the GCM tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Concatenate into `salt || iv || ciphertext || tag`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Split a concatenated envelope. Anything shorter than salt, iv and an
    /// empty-plaintext tag is rejected.
    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        if bytes.len() < SALT_LEN + IV_LEN + TAG_LEN {
            return Err(VaultError::DecryptionFailure);
        }

        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (iv, ciphertext) = rest.split_at(IV_LEN);

        let mut envelope = Self {
            salt: [0u8; SALT_LEN],
            iv: [0u8; IV_LEN],
            ciphertext: ciphertext.to_vec(),
        };
        envelope.salt.copy_from_slice(salt);
        envelope.iv.copy_from_slice(iv);
        Ok(envelope)
    }

    /// Text-safe transport form (standard base64).
    pub fn encode(&self) -> String {
        BASE64.encode(self.to_bytes())
    }

    pub fn decode(encoded: &str) -> VaultResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| VaultError::DecryptionFailure)?;
        Self::from_bytes(&bytes)
    }
}

/// Derive a 256-bit key from a password and salt with PBKDF2-HMAC-SHA256.
pub fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key[..]);
    key
}

fn cipher_for(password: &str, salt: &[u8]) -> Aes256Gcm {
    let key = derive_key(password, salt);
    Aes256Gcm::new(aes_gcm::Key::<Aes256Gcm>::from_slice(&key[..]))
}

/// Encrypt a secret under a password with a fresh salt and IV.
pub fn encrypt(secret: &[u8], password: &str) -> VaultResult<EncryptedEnvelope> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let cipher = cipher_for(password, &salt);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), secret)
        .map_err(|_| VaultError::EncryptionFailure)?;

    Ok(EncryptedEnvelope {
        salt,
        iv,
        ciphertext,
    })
}

/// Decrypt an envelope. Wrong password and tampered data are indistinguishable.
pub fn decrypt(envelope: &EncryptedEnvelope, password: &str) -> VaultResult<SecretMaterial> {
    let cipher = cipher_for(password, &envelope.salt);
    cipher
        .decrypt(Nonce::from_slice(&envelope.iv), envelope.ciphertext.as_ref())
        .map(SecretMaterial::new)
        .map_err(|_| VaultError::DecryptionFailure)
}
