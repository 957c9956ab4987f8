//! Nostr network boundary for admin assertions.

pub mod event;
pub mod relay;

pub use event::{AdminAssertion, AssertionFilter, ADMIN_WHITELIST_IDENTIFIER, APP_DATA_KIND};
pub use relay::{AssertionStream, MemoryRelay, RelayClient, RelayError, RelayPool, SharedRelay};
