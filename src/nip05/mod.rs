//! Client for the NIP-05 registration service.
//!
//! The service maps usernames to public identities under a domain. Users
//! submit registrations; an admin holding the service API key approves or
//! rejects them. Approved names are served publicly from
//! `/.well-known/nostr.json`.

mod client;

pub use client::Nip05Client;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const USERNAME_MAX_LEN: usize = 64;
const PUBKEY_HEX_LEN: usize = 64;

/// NIP-05 client errors
#[derive(Debug, Error)]
pub enum Nip05Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unauthorized: admin API key missing or invalid")]
    Unauthorized,

    #[error("Invalid username: must be 1-64 characters of a-z, 0-9, '_' or '-'")]
    InvalidUsername,

    #[error("Invalid pubkey: must be 64 hexadecimal characters")]
    InvalidPubkey,
}

impl Nip05Error {
    /// Username already registered or already pending.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Rejected { status: 409, .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Rejected { status: 404, .. })
    }
}

/// Public `nostr.json` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nip05Names {
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

/// A registration awaiting an admin decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub username: String,
    pub pubkey: String,
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub status: RegistrationStatus,
}

/// An approved name binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    pub pubkey: String,
    pub nip05: String,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub service: String,
}

/// Check a username against the service's rules.
pub fn validate_username(username: &str) -> Result<(), Nip05Error> {
    let valid = !username.is_empty()
        && username.len() <= USERNAME_MAX_LEN
        && username
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');

    if valid {
        Ok(())
    } else {
        Err(Nip05Error::InvalidUsername)
    }
}

/// Check a hex public identity and return it lowercased.
pub fn validate_pubkey(pubkey: &str) -> Result<String, Nip05Error> {
    if pubkey.len() == PUBKEY_HEX_LEN && pubkey.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(pubkey.to_ascii_lowercase())
    } else {
        Err(Nip05Error::InvalidPubkey)
    }
}
