//! Layered whitelist resolution.
//!
//! Precedence, highest first:
//! 1. the locally persisted cache, when present and non-empty
//! 2. the statically configured defaults
//! 3. the newest admin assertion on the network, attempted whenever an admin
//!    is configured; its answer replaces whatever 1 or 2 produced and is
//!    written back to the cache
//!
//! Each layer implements [`WhitelistSource`].

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::snapshot::{SnapshotOrigin, WhitelistError, WhitelistSnapshot};
use super::state::{ResolutionToken, WhitelistState};
use crate::admin::AdminPrincipalSet;
use crate::nostr::{AdminAssertion, AssertionFilter, SharedRelay, ADMIN_WHITELIST_IDENTIFIER, APP_DATA_KIND};
use crate::store::{SharedStore, StoreError};

/// Cache key for the persisted whitelist (JSON array of lowercase strings).
pub const WHITELIST_CACHE_KEY: &str = "admin:hashtagWhitelist";

/// One layer of the precedence chain.
#[async_trait]
pub trait WhitelistSource: Send + Sync {
    fn origin(&self) -> SnapshotOrigin;

    /// `Ok(None)` when this layer has nothing to say.
    async fn try_resolve(&self) -> Result<Option<WhitelistSnapshot>, WhitelistError>;
}

/// Runtime-mutable cache in the key/value store.
pub struct LocalCacheSource {
    store: SharedStore,
}

impl LocalCacheSource {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn persist(&self, snapshot: &WhitelistSnapshot) -> Result<(), WhitelistError> {
        let value = serde_json::to_string(&snapshot.to_vec()).map_err(StoreError::from)?;
        self.store.put(WHITELIST_CACHE_KEY, &value).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<bool, WhitelistError> {
        Ok(self.store.delete(WHITELIST_CACHE_KEY).await?)
    }
}

#[async_trait]
impl WhitelistSource for LocalCacheSource {
    fn origin(&self) -> SnapshotOrigin {
        SnapshotOrigin::Local
    }

    async fn try_resolve(&self) -> Result<Option<WhitelistSnapshot>, WhitelistError> {
        let Some(raw) = self.store.get(WHITELIST_CACHE_KEY).await? else {
            return Ok(None);
        };

        let tags: Vec<String> = serde_json::from_str(&raw).map_err(StoreError::from)?;
        let snapshot = WhitelistSnapshot::new(tags, SnapshotOrigin::Local, None);
        Ok((!snapshot.is_empty()).then_some(snapshot))
    }
}

/// Defaults from deployment configuration.
pub struct StaticSource {
    tags: Vec<String>,
}

impl StaticSource {
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }
}

#[async_trait]
impl WhitelistSource for StaticSource {
    fn origin(&self) -> SnapshotOrigin {
        SnapshotOrigin::Static
    }

    async fn try_resolve(&self) -> Result<Option<WhitelistSnapshot>, WhitelistError> {
        let snapshot = WhitelistSnapshot::new(&self.tags, SnapshotOrigin::Static, None);
        Ok((!snapshot.is_empty()).then_some(snapshot))
    }
}

/// Newest admin assertion across the configured relays.
pub struct NetworkSource {
    relay: SharedRelay,
    admins: AdminPrincipalSet,
}

impl NetworkSource {
    pub fn new(relay: SharedRelay, admins: AdminPrincipalSet) -> Self {
        Self { relay, admins }
    }

    pub fn filter(&self) -> AssertionFilter {
        AssertionFilter::admin_whitelist(self.admins.authors())
    }
}

#[async_trait]
impl WhitelistSource for NetworkSource {
    fn origin(&self) -> SnapshotOrigin {
        SnapshotOrigin::Network
    }

    async fn try_resolve(&self) -> Result<Option<WhitelistSnapshot>, WhitelistError> {
        if self.admins.is_empty() {
            return Ok(None);
        }

        let assertions = self.relay.query(&self.filter()).await?;
        let Some(latest) = select_latest(&assertions, &self.admins) else {
            debug!(candidates = assertions.len(), "No eligible admin whitelist assertion");
            return Ok(None);
        };

        WhitelistSnapshot::from_assertion(latest).inspect_err(|e| {
            warn!(assertion = %latest.id, "Failed to parse admin hashtag whitelist: {}", e);
        })
    }
}

/// Whether an assertion is an admin whitelist assertion from a trusted author.
pub fn is_eligible(assertion: &AdminAssertion, admins: &AdminPrincipalSet) -> bool {
    assertion.kind == APP_DATA_KIND
        && assertion.identifier() == Some(ADMIN_WHITELIST_IDENTIFIER)
        && admins.is_admin(assertion.pubkey.as_str())
}

/// Last writer wins by asserted `created_at`; ties go to the lowest id.
pub fn select_latest<'a>(
    assertions: &'a [AdminAssertion],
    admins: &AdminPrincipalSet,
) -> Option<&'a AdminAssertion> {
    assertions
        .iter()
        .filter(|a| is_eligible(a, admins))
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| b.id.cmp(&a.id))
        })
}

/// Result of a network refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A snapshot was installed (possibly allow-all).
    Applied,
    /// A newer resolution committed first; this result was dropped.
    Stale,
    /// Relays could not be queried; the previous snapshot stays.
    Unavailable,
    /// No admin configured.
    Skipped,
}

/// Resolves the whitelist and keeps [`WhitelistState`] current.
pub struct WhitelistResolver {
    admins: AdminPrincipalSet,
    cache: Arc<LocalCacheSource>,
    local_chain: Vec<Arc<dyn WhitelistSource>>,
    network: Option<NetworkSource>,
    state: Arc<WhitelistState>,
}

impl WhitelistResolver {
    /// Network aggregation is only wired up when `admins` is non-empty and a
    /// relay is supplied.
    pub fn new(
        admins: AdminPrincipalSet,
        store: SharedStore,
        default_tags: Vec<String>,
        relay: Option<SharedRelay>,
    ) -> Self {
        let cache = Arc::new(LocalCacheSource::new(store));
        let local_chain = vec![
            cache.clone() as Arc<dyn WhitelistSource>,
            Arc::new(StaticSource::new(default_tags)) as Arc<dyn WhitelistSource>,
        ];

        let network = relay
            .filter(|_| !admins.is_empty())
            .map(|relay| NetworkSource::new(relay, admins.clone()));

        Self {
            admins,
            cache,
            local_chain,
            network,
            state: Arc::new(WhitelistState::new()),
        }
    }

    pub fn state(&self) -> &Arc<WhitelistState> {
        &self.state
    }

    pub fn admins(&self) -> &AdminPrincipalSet {
        &self.admins
    }

    /// Subscription filter for qualifying assertions, if networking is enabled.
    pub fn assertion_filter(&self) -> Option<AssertionFilter> {
        self.network.as_ref().map(NetworkSource::filter)
    }

    /// First non-empty answer from the local chain, or allow-all.
    pub async fn resolve_local(&self) -> WhitelistSnapshot {
        for source in &self.local_chain {
            match source.try_resolve().await {
                Ok(Some(snapshot)) => return snapshot,
                Ok(None) => {}
                Err(e) => warn!(source = source.origin().as_str(), "Whitelist source failed: {}", e),
            }
        }
        WhitelistSnapshot::allow_all(SnapshotOrigin::Static)
    }

    /// Full resolution: local chain first, then the network when enabled.
    pub async fn resolve(&self) -> Arc<WhitelistSnapshot> {
        let token = self.state.begin();
        let local = self.resolve_local().await;
        info!(
            origin = local.origin().as_str(),
            tags = local.len(),
            "Whitelist resolved locally"
        );
        self.state.commit(token, local);

        self.refresh_from_network().await;
        self.state.get()
    }

    /// Re-run network aggregation with a fresh token.
    pub async fn refresh_from_network(&self) -> RefreshOutcome {
        let token = self.state.begin();
        self.refresh_with(token).await
    }

    /// Re-run network aggregation, committing only if `token` is still current.
    pub async fn refresh_with(&self, token: ResolutionToken) -> RefreshOutcome {
        let Some(network) = &self.network else {
            return RefreshOutcome::Skipped;
        };

        // Only a published list is written back; fallbacks leave the cache alone
        let (snapshot, published) = match network.try_resolve().await {
            Ok(Some(snapshot)) => (snapshot, true),
            // No whitelist published, or content we cannot read: allow all
            Ok(None) | Err(WhitelistError::ContentMalformed(_)) => {
                (WhitelistSnapshot::allow_all(SnapshotOrigin::Network), false)
            }
            Err(e) => {
                warn!("Keeping previous whitelist: {}", e);
                return RefreshOutcome::Unavailable;
            }
        };

        let tags = snapshot.len();
        let to_cache = published.then(|| snapshot.clone());

        if !self.state.commit(token, snapshot) {
            return RefreshOutcome::Stale;
        }
        info!(tags, token = token.value(), "Whitelist updated from admin assertion");

        if let Some(snapshot) = to_cache {
            if let Err(e) = self.write_cache(&snapshot).await {
                warn!("Failed to persist whitelist cache: {}", e);
            }
        }
        RefreshOutcome::Applied
    }

    /// An empty list clears the cache so the static defaults apply again.
    async fn write_cache(&self, snapshot: &WhitelistSnapshot) -> Result<(), WhitelistError> {
        if snapshot.is_empty() {
            self.cache.clear().await?;
        } else {
            self.cache.persist(snapshot).await?;
        }
        Ok(())
    }

    /// Replace the local cache and the current snapshot (admin edit).
    pub async fn set_local<I, S>(&self, tags: I) -> Result<Arc<WhitelistSnapshot>, WhitelistError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let snapshot = WhitelistSnapshot::new(tags, SnapshotOrigin::Local, None);
        self.write_cache(&snapshot).await?;
        self.state.set(snapshot);
        Ok(self.state.get())
    }
}

impl std::fmt::Debug for WhitelistResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhitelistResolver")
            .field("admins", &self.admins.len())
            .field("network", &self.network.is_some())
            .field("state", &self.state)
            .finish()
    }
}
