//! Admin-controlled hashtag whitelist.
//!
//! The whitelist is resolved from a local cache, static configuration and the
//! newest admin assertion replicated by relays. An empty whitelist permits
//! every tag.
//!
//! ## Usage
//!
//! ```ignore
//! let resolver = Arc::new(WhitelistResolver::new(admins, store, defaults, Some(relay.clone())));
//! resolver.resolve().await;
//! let _sync = WhitelistSync::spawn(resolver.clone(), relay.as_ref())?;
//!
//! let visible = resolver.state().get().filter_tags(post_tags);
//! ```

pub mod resolver;
pub mod snapshot;
pub mod state;
pub mod sync;

pub use resolver::{
    is_eligible, select_latest, LocalCacheSource, NetworkSource, RefreshOutcome, StaticSource,
    WhitelistResolver, WhitelistSource, WHITELIST_CACHE_KEY,
};
pub use snapshot::{
    normalize_tag, whitelist_content, SnapshotOrigin, WhitelistError, WhitelistSnapshot,
    WHITELIST_CONTENT_FIELD,
};
pub use state::{ResolutionToken, WhitelistState};
pub use sync::WhitelistSync;
