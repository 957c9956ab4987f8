//! Administrator trust.
//!
//! Admin identities are derived once at startup from configuration, either a
//! list of public keys or a single `nsec` secret, and then passed by
//! reference to everything that needs to decide whether an author is trusted.
//!
//! ## Usage
//!
//! ```ignore
//! let config = AppConfig::load()?;
//! let admins = AdminPrincipalSet::from_config(&config.admin);
//!
//! if admins.is_admin(event.pubkey.as_str()) {
//!     // trusted
//! }
//! ```

pub mod identity;

pub use identity::{
    decode_secret_key, derive_public_identity, encode_public_identity, parse_public_identity,
    AdminPrincipalSet, AdminResolution, ConfigIssue,
};
