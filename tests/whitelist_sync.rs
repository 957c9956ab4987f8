//! End-to-end whitelist reconciliation over in-process relays.
//!
//! Admin identities are derived from real keys, assertions flow through a
//! relay pool, and the state observed by consumers is checked after every
//! live update.

use std::sync::Arc;
use std::time::Duration;

use anmore::admin::{derive_public_identity, AdminPrincipalSet};
use anmore::config::AdminConfig;
use anmore::nostr::{
    AdminAssertion, MemoryRelay, RelayPool, SharedRelay, ADMIN_WHITELIST_IDENTIFIER,
    APP_DATA_KIND,
};
use anmore::store::{KeyValueStore, SqliteStore};
use anmore::whitelist::{
    whitelist_content, SnapshotOrigin, WhitelistResolver, WhitelistSnapshot, WhitelistSync,
    WHITELIST_CACHE_KEY,
};
use tokio::sync::broadcast;

/// NIP-19 test vector.
const ADMIN_NSEC: &str = "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5";
const STRANGER: &str = "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

struct Harness {
    admin: String,
    relays: Vec<Arc<MemoryRelay>>,
    store: Arc<SqliteStore>,
    resolver: Arc<WhitelistResolver>,
    pool: Arc<RelayPool>,
}

impl Harness {
    async fn start(defaults: &[&str]) -> Self {
        let config = AdminConfig {
            nsec: Some(ADMIN_NSEC.to_string()),
            ..Default::default()
        };
        let admins = AdminPrincipalSet::from_config(&config);
        let admin = derive_public_identity(ADMIN_NSEC).unwrap();
        assert!(admins.is_admin(admin.as_str()));

        let relays = vec![
            Arc::new(MemoryRelay::new("wss://relay-a")),
            Arc::new(MemoryRelay::new("wss://relay-b")),
        ];
        let pool = Arc::new(RelayPool::new(
            relays.iter().map(|r| r.clone() as SharedRelay).collect(),
        ));

        let store = Arc::new(SqliteStore::connect("sqlite::memory:", 1).await.unwrap());
        let resolver = Arc::new(WhitelistResolver::new(
            admins,
            store.clone(),
            defaults.iter().map(|s| s.to_string()).collect(),
            Some(pool.clone()),
        ));

        Self {
            admin,
            relays,
            store,
            resolver,
            pool,
        }
    }

    fn assertion(&self, id: &str, author: &str, created_at: i64, tags: &[&str]) -> AdminAssertion {
        AdminAssertion {
            id: id.to_string(),
            pubkey: author.to_string(),
            created_at,
            kind: APP_DATA_KIND,
            tags: vec![vec!["d".to_string(), ADMIN_WHITELIST_IDENTIFIER.to_string()]],
            content: whitelist_content(tags.iter().copied()),
            sig: String::new(),
        }
    }
}

async fn next_update(rx: &mut broadcast::Receiver<Arc<WhitelistSnapshot>>) -> Arc<WhitelistSnapshot> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for whitelist update")
        .expect("whitelist state closed")
}

#[tokio::test]
async fn test_latest_assertion_wins_regardless_of_arrival() {
    let h = Harness::start(&[]).await;
    h.resolver.resolve().await;

    let mut updates = h.resolver.state().subscribe();
    let _sync = WhitelistSync::spawn(h.resolver.clone(), h.pool.as_ref()).unwrap();

    let newer = h.assertion("a1", &h.admin, 100, &["nostr", "bitcoin"]);
    h.relays[0].publish(newer);
    let snapshot = next_update(&mut updates).await;
    assert_eq!(snapshot.to_vec(), vec!["bitcoin", "nostr"]);

    // Older assertion observed later, on another relay
    let older = h.assertion("a2", &h.admin, 50, &["foo"]);
    h.relays[1].publish(older);
    let snapshot = next_update(&mut updates).await;
    assert_eq!(snapshot.to_vec(), vec!["bitcoin", "nostr"]);

    let state = h.resolver.state();
    assert!(state.is_permitted("Nostr"));
    assert!(!state.is_permitted("foo"));
    assert_eq!(state.get().origin_timestamp(), Some(100));
}

#[tokio::test]
async fn test_untrusted_author_never_applies() {
    let h = Harness::start(&[]).await;
    h.relays[0].publish(h.assertion("a1", &h.admin, 100, &["nostr"]));
    h.resolver.resolve().await;

    let mut updates = h.resolver.state().subscribe();
    let _sync = WhitelistSync::spawn(h.resolver.clone(), h.pool.as_ref()).unwrap();

    h.relays[0].publish(h.assertion("s1", STRANGER, 10_000, &["spam"]));
    // Followed by a trusted no-op so there is an update to wait for
    h.relays[1].publish(h.assertion("a0", &h.admin, 1, &["ignored"]));

    let snapshot = next_update(&mut updates).await;
    assert_eq!(snapshot.to_vec(), vec!["nostr"]);
    assert!(!h.resolver.state().is_permitted("spam"));
}

#[tokio::test]
async fn test_cache_precedence_and_write_back() {
    let h = Harness::start(&["static"]).await;
    h.store
        .put(WHITELIST_CACHE_KEY, r#"["cached"]"#)
        .await
        .unwrap();
    h.relays.iter().for_each(|r| r.set_available(false));

    let snapshot = h.resolver.resolve().await;
    assert_eq!(snapshot.to_vec(), vec!["cached"]);
    assert_eq!(snapshot.origin(), SnapshotOrigin::Local);

    // Relays come back with an admin assertion; it replaces and is cached
    h.relays.iter().for_each(|r| r.set_available(true));
    h.relays[1].publish(h.assertion("a1", &h.admin, 200, &["#Art", "music"]));
    h.resolver.refresh_from_network().await;

    assert_eq!(h.resolver.state().get().to_vec(), vec!["art", "music"]);
    assert_eq!(
        h.store.get(WHITELIST_CACHE_KEY).await.unwrap().as_deref(),
        Some(r#"["art","music"]"#)
    );
}

#[tokio::test]
async fn test_partial_relay_outage_still_converges() {
    let h = Harness::start(&[]).await;
    h.relays[0].publish(h.assertion("a1", &h.admin, 300, &["kept"]));
    h.relays[1].publish(h.assertion("a2", &h.admin, 100, &["stale"]));
    h.relays[1].set_available(false);

    let snapshot = h.resolver.resolve().await;
    assert_eq!(snapshot.to_vec(), vec!["kept"]);
}
