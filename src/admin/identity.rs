//! Administrator identity derivation.
//!
//! The set of trusted admin public keys is computed once from configuration
//! and never changes afterwards. Misconfiguration degrades to "no admin";
//! nothing about why a secret was rejected is returned to callers or logged.

use bech32::{Bech32, Hrp};
use k256::schnorr::SigningKey;
use std::collections::BTreeSet;
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::config::AdminConfig;

/// Human readable part for secret keys.
pub const NSEC_HRP: Hrp = Hrp::parse_unchecked("nsec");
/// Human readable part for public keys.
pub const NPUB_HRP: Hrp = Hrp::parse_unchecked("npub");

const NSEC_PREFIX: &str = "nsec1";
/// `nsec1` + 52 data characters + 6 checksum characters.
const NSEC_MIN_LEN: usize = 63;
const KEY_SIZE: usize = 32;

/// Why a configuration produced no admins. Carries no configured values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssue {
    MissingPrefix,
    TooShort,
    Undecodable,
    InvalidScalar,
    MalformedPublicKey,
}

/// Outcome of admin resolution.
///
/// Production code should only ever look at [`AdminResolution::into_principals`];
/// the variants exist so tests can tell "not configured" from "invalid".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminResolution {
    NotConfigured,
    Invalid(ConfigIssue),
    Resolved(AdminPrincipalSet),
}

impl AdminResolution {
    /// Resolve from configuration. A configured secret takes precedence over
    /// the public key list.
    pub fn resolve(config: &AdminConfig) -> Self {
        if let Some(secret) = config.secret() {
            return match derive_public_identity(secret) {
                Ok(pubkey) => Self::Resolved(AdminPrincipalSet::from_keys([pubkey])),
                Err(issue) => Self::Invalid(issue),
            };
        }

        let entries = config.pubkey_list();
        if entries.is_empty() {
            return Self::NotConfigured;
        }

        match entries
            .iter()
            .map(|entry| parse_public_identity(entry))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(keys) => Self::Resolved(AdminPrincipalSet::from_keys(keys)),
            Err(issue) => Self::Invalid(issue),
        }
    }

    pub fn into_principals(self) -> AdminPrincipalSet {
        match self {
            Self::Resolved(set) => set,
            Self::NotConfigured | Self::Invalid(_) => AdminPrincipalSet::empty(),
        }
    }
}

/// Immutable set of trusted admin public keys (lowercase hex).
///
/// Cheap to clone; every clone shares the same set. An empty set means no
/// admin is configured and no privileged action is possible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminPrincipalSet {
    keys: Arc<BTreeSet<String>>,
}

impl AdminPrincipalSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from already-validated lowercase hex keys.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Arc::new(keys.into_iter().map(Into::into).collect()),
        }
    }

    /// Resolve from configuration, collapsing every failure to the empty set.
    pub fn from_config(config: &AdminConfig) -> Self {
        AdminResolution::resolve(config).into_principals()
    }

    /// Membership test. Absent or blank identities are never admins.
    pub fn is_admin<'a>(&self, identity: impl Into<Option<&'a str>>) -> bool {
        match identity.into() {
            Some(id) if !id.is_empty() => self.keys.contains(id),
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Sorted author list for relay filters.
    pub fn authors(&self) -> Vec<String> {
        self.keys.iter().cloned().collect()
    }
}

/// Decode an `nsec1…` literal into the raw 32-byte secret.
pub fn decode_secret_key(literal: &str) -> Result<Zeroizing<[u8; KEY_SIZE]>, ConfigIssue> {
    let literal = literal.trim();
    if !literal.to_ascii_lowercase().starts_with(NSEC_PREFIX) {
        return Err(ConfigIssue::MissingPrefix);
    }
    if literal.len() < NSEC_MIN_LEN {
        return Err(ConfigIssue::TooShort);
    }

    let (hrp, data) = bech32::decode(literal).map_err(|_| ConfigIssue::Undecodable)?;
    let data = Zeroizing::new(data);
    if hrp != NSEC_HRP || data.len() != KEY_SIZE {
        return Err(ConfigIssue::Undecodable);
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(&data);
    Ok(key)
}

/// Derive the x-only public key (lowercase hex) for an `nsec1…` literal.
pub fn derive_public_identity(literal: &str) -> Result<String, ConfigIssue> {
    let secret = decode_secret_key(literal)?;
    let signing_key =
        SigningKey::from_bytes(&secret[..]).map_err(|_| ConfigIssue::InvalidScalar)?;
    Ok(hex::encode(signing_key.verifying_key().to_bytes()))
}

/// Normalize a configured public identity: 64 hex chars or `npub1…`.
pub fn parse_public_identity(entry: &str) -> Result<String, ConfigIssue> {
    let entry = entry.trim();

    if entry.len() == KEY_SIZE * 2 && entry.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(entry.to_ascii_lowercase());
    }

    let (hrp, data) = bech32::decode(entry).map_err(|_| ConfigIssue::MalformedPublicKey)?;
    if hrp != NPUB_HRP || data.len() != KEY_SIZE {
        return Err(ConfigIssue::MalformedPublicKey);
    }
    Ok(hex::encode(data))
}

/// Encode a raw public key as `npub1…`.
pub fn encode_public_identity(hex_key: &str) -> Option<String> {
    let bytes = hex::decode(hex_key).ok()?;
    if bytes.len() != KEY_SIZE {
        return None;
    }
    bech32::encode::<Bech32>(NPUB_HRP, &bytes).ok()
}

#[cfg(test)]
pub(crate) fn encode_secret_key(secret: &[u8; KEY_SIZE]) -> String {
    bech32::encode::<Bech32>(NSEC_HRP, secret).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Secret scalar 1: its public key is the generator's x coordinate.
    const GENERATOR_X: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn scalar_one() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        key[KEY_SIZE - 1] = 1;
        key
    }

    fn config_with_secret(nsec: &str) -> AdminConfig {
        AdminConfig {
            pubkeys: String::new(),
            nsec: Some(nsec.to_string()),
        }
    }

    #[test]
    fn test_derive_known_public_identity() {
        let nsec = encode_secret_key(&scalar_one());
        assert!(nsec.starts_with("nsec1"));
        assert_eq!(nsec.len(), NSEC_MIN_LEN);
        assert_eq!(derive_public_identity(&nsec).unwrap(), GENERATOR_X);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let nsec = "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5";
        let first = derive_public_identity(nsec).unwrap();
        for _ in 0..3 {
            assert_eq!(derive_public_identity(nsec).unwrap(), first);
        }
        assert_eq!(first.len(), 64);
        assert_eq!(first, first.to_ascii_lowercase());
    }

    #[test]
    fn test_resolve_from_secret() {
        let config = config_with_secret(&encode_secret_key(&scalar_one()));
        let admins = AdminPrincipalSet::from_config(&config);

        assert_eq!(admins.len(), 1);
        assert!(admins.is_admin(GENERATOR_X));
        assert!(!admins.is_admin("deadbeef"));
    }

    #[test]
    fn test_fail_closed_on_bad_secret() {
        let corrupted = encode_secret_key(&scalar_one()).replace('q', "p");
        let cases = [
            ("npub1xyz", ConfigIssue::MissingPrefix),
            ("nsec1abc", ConfigIssue::TooShort),
            (corrupted.as_str(), ConfigIssue::Undecodable),
        ];

        for (literal, expected) in cases {
            let resolution = AdminResolution::resolve(&config_with_secret(literal));
            assert_eq!(resolution, AdminResolution::Invalid(expected));

            let admins = resolution.into_principals();
            assert!(admins.is_empty());
            assert!(!admins.is_admin(GENERATOR_X));
            assert!(!admins.is_admin(literal));
        }
    }

    #[test]
    fn test_zero_scalar_is_rejected() {
        let nsec = encode_secret_key(&[0u8; KEY_SIZE]);
        assert_eq!(
            AdminResolution::resolve(&config_with_secret(&nsec)),
            AdminResolution::Invalid(ConfigIssue::InvalidScalar)
        );
    }

    #[test]
    fn test_not_configured() {
        let resolution = AdminResolution::resolve(&AdminConfig::default());
        assert_eq!(resolution, AdminResolution::NotConfigured);
        assert!(resolution.into_principals().is_empty());

        let blank = config_with_secret("   ");
        assert_eq!(AdminResolution::resolve(&blank), AdminResolution::NotConfigured);
    }

    #[test]
    fn test_resolve_from_pubkey_list() {
        let npub = encode_public_identity(GENERATOR_X).unwrap();
        let upper = "AB".repeat(32);
        let config = AdminConfig {
            pubkeys: format!("{}, {}", npub, upper),
            nsec: None,
        };

        let admins = AdminPrincipalSet::from_config(&config);
        assert_eq!(admins.len(), 2);
        assert!(admins.is_admin(GENERATOR_X));
        assert!(admins.is_admin(&*"ab".repeat(32)));
    }

    #[test]
    fn test_malformed_list_entry_invalidates_list() {
        let config = AdminConfig {
            pubkeys: format!("{},not-a-key", GENERATOR_X),
            nsec: None,
        };
        assert_eq!(
            AdminResolution::resolve(&config),
            AdminResolution::Invalid(ConfigIssue::MalformedPublicKey)
        );
    }

    #[test]
    fn test_is_admin_absent_input() {
        let admins = AdminPrincipalSet::from_keys([GENERATOR_X]);
        assert!(!admins.is_admin(None::<&str>));
        assert!(!admins.is_admin(Some("")));
        assert!(admins.is_admin(Some(GENERATOR_X)));
    }

    #[test]
    fn test_clones_share_the_set() {
        let admins = AdminPrincipalSet::from_keys(["b", "a"]);
        let clone = admins.clone();
        assert_eq!(admins, clone);
        assert_eq!(clone.authors(), vec!["a", "b"]);
    }
}
