//! Live whitelist updates.

use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::resolver::{is_eligible, WhitelistResolver};
use crate::nostr::{RelayClient, RelayError};

/// Background task re-running network aggregation whenever a qualifying
/// admin assertion is observed.
///
/// Each trigger takes a resolution token at the moment the assertion arrives
/// and queries the full assertion set, so overlapping refreshes converge on
/// the newest assertion whatever order they finish in. The task stops when
/// this handle is dropped.
pub struct WhitelistSync {
    handle: Option<JoinHandle<()>>,
}

impl WhitelistSync {
    /// Subscribe through `relay` and start listening.
    ///
    /// With no admin configured there is nothing to follow and the returned
    /// handle is inactive.
    pub fn spawn(
        resolver: Arc<WhitelistResolver>,
        relay: &dyn RelayClient,
    ) -> Result<Self, RelayError> {
        let Some(filter) = resolver.assertion_filter() else {
            debug!("No admin configured, whitelist sync disabled");
            return Ok(Self { handle: None });
        };

        let mut events = relay.subscribe(filter)?;
        info!(relay = relay.name(), admins = resolver.admins().len(), "Whitelist sync started");

        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if !is_eligible(&event, resolver.admins()) {
                    continue;
                }

                let token = resolver.state().begin();
                debug!(assertion = %event.id, created_at = event.created_at, token = token.value(), "Admin whitelist assertion observed");

                let resolver = resolver.clone();
                tokio::spawn(async move {
                    let outcome = resolver.refresh_with(token).await;
                    debug!(token = token.value(), ?outcome, "Whitelist refresh finished");
                });
            }
            info!("Whitelist subscription closed");
        });

        Ok(Self {
            handle: Some(handle),
        })
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop listening. Refreshes already in flight still complete.
    pub fn abort(&self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

impl Drop for WhitelistSync {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::AdminPrincipalSet;
    use crate::nostr::{AdminAssertion, MemoryRelay, ADMIN_WHITELIST_IDENTIFIER, APP_DATA_KIND};
    use crate::store::MemoryStore;
    use crate::whitelist::snapshot::whitelist_content;
    use std::time::Duration;

    fn assertion(id: &str, created_at: i64, tags: &[&str]) -> AdminAssertion {
        AdminAssertion {
            id: id.to_string(),
            pubkey: "aa".to_string(),
            created_at,
            kind: APP_DATA_KIND,
            tags: vec![vec!["d".to_string(), ADMIN_WHITELIST_IDENTIFIER.to_string()]],
            content: whitelist_content(tags.iter().copied()),
            sig: String::new(),
        }
    }

    fn resolver(admins: &[&str], relay: &Arc<MemoryRelay>) -> Arc<WhitelistResolver> {
        Arc::new(WhitelistResolver::new(
            AdminPrincipalSet::from_keys(admins.iter().copied()),
            Arc::new(MemoryStore::new()),
            Vec::new(),
            Some(relay.clone()),
        ))
    }

    #[tokio::test]
    async fn test_inactive_without_admins() {
        let relay = Arc::new(MemoryRelay::new("r1"));
        let sync = WhitelistSync::spawn(resolver(&[], &relay), relay.as_ref()).unwrap();

        assert!(!sync.is_active());
        assert_eq!(relay.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_trigger_refreshes_state() {
        let relay = Arc::new(MemoryRelay::new("r1"));
        let resolver = resolver(&["aa"], &relay);
        let mut updates = resolver.state().subscribe();
        let sync = WhitelistSync::spawn(resolver.clone(), relay.as_ref()).unwrap();
        assert!(sync.is_active());

        relay.publish(assertion("e1", 100, &["nostr"]));
        let snapshot = tokio::time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.to_vec(), vec!["nostr"]);
        assert!(!resolver.state().is_permitted("foo"));
    }

    #[tokio::test]
    async fn test_abort_on_drop() {
        let relay = Arc::new(MemoryRelay::new("r1"));
        let sync = WhitelistSync::spawn(resolver(&["aa"], &relay), relay.as_ref()).unwrap();
        assert_eq!(relay.subscriber_count(), 1);

        drop(sync);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(relay.subscriber_count(), 0);
    }
}
