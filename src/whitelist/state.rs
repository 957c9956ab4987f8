//! Framework-neutral holder for the current whitelist.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::debug;

use super::snapshot::{SnapshotOrigin, WhitelistSnapshot};

/// Ticket handed out when a resolution starts.
///
/// Results carrying an older ticket than the last committed one are dropped,
/// so a slow resolution can never overwrite a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResolutionToken(u64);

impl ResolutionToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

struct Committed {
    token: u64,
    snapshot: Arc<WhitelistSnapshot>,
}

/// Current whitelist with synchronous reads, atomic replacement and
/// change notifications.
pub struct WhitelistState {
    current: RwLock<Committed>,
    issued: AtomicU64,
    tx: broadcast::Sender<Arc<WhitelistSnapshot>>,
}

impl WhitelistState {
    /// Start out allowing everything.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            current: RwLock::new(Committed {
                token: 0,
                snapshot: Arc::new(WhitelistSnapshot::allow_all(SnapshotOrigin::Local)),
            }),
            issued: AtomicU64::new(0),
            tx,
        }
    }

    /// The snapshot in effect right now.
    pub fn get(&self) -> Arc<WhitelistSnapshot> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }

    /// Shorthand for `get().is_permitted(tag)`.
    pub fn is_permitted(&self, tag: &str) -> bool {
        self.get().is_permitted(tag)
    }

    /// Issue a fresh token, strictly greater than every earlier one.
    pub fn begin(&self) -> ResolutionToken {
        ResolutionToken(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Replace the snapshot if `token` is newer than the last committed one.
    ///
    /// Returns whether the snapshot was installed.
    pub fn commit(&self, token: ResolutionToken, snapshot: WhitelistSnapshot) -> bool {
        let snapshot = Arc::new(snapshot);
        {
            let mut current = self
                .current
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if token.0 <= current.token {
                debug!(
                    token = token.0,
                    committed = current.token,
                    "Discarding stale whitelist resolution"
                );
                return false;
            }
            current.token = token.0;
            current.snapshot = snapshot.clone();
        }

        let _ = self.tx.send(snapshot);
        true
    }

    /// Unconditional replacement.
    pub fn set(&self, snapshot: WhitelistSnapshot) {
        let token = self.begin();
        self.commit(token, snapshot);
    }

    /// Receive every snapshot installed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<WhitelistSnapshot>> {
        self.tx.subscribe()
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for WhitelistState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WhitelistState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhitelistState")
            .field("snapshot", &self.get())
            .field("issued", &self.issued.load(Ordering::SeqCst))
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
