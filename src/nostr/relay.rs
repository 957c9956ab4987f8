//! Relay boundary: querying and subscribing to admin assertions.
//!
//! Wire transport is not part of this crate. Embedders implement
//! [`RelayClient`] over their relay connections; [`MemoryRelay`] is an
//! in-process implementation and [`RelayPool`] fans out over several.

use super::event::{AdminAssertion, AssertionFilter};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{self, join_all};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Relay unavailable: {0}")]
    Unavailable(String),

    #[error("No relays configured")]
    NoRelays,
}

/// Stream of newly observed assertions matching a subscription filter.
pub type AssertionStream = BoxStream<'static, AdminAssertion>;

/// A source of replicated admin assertions.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Every stored assertion matching `filter`.
    async fn query(&self, filter: &AssertionFilter) -> Result<Vec<AdminAssertion>, RelayError>;

    /// Assertions matching `filter` observed from now on.
    fn subscribe(&self, filter: AssertionFilter) -> Result<AssertionStream, RelayError>;

    /// Human readable label for logs.
    fn name(&self) -> &str;
}

/// Shared relay handle.
pub type SharedRelay = Arc<dyn RelayClient>;

/// In-process relay holding assertions in memory.
pub struct MemoryRelay {
    name: String,
    events: DashMap<String, AdminAssertion>,
    tx: broadcast::Sender<AdminAssertion>,
    available: AtomicBool,
}

impl MemoryRelay {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            name: name.into(),
            events: DashMap::new(),
            tx,
            available: AtomicBool::new(true),
        }
    }

    /// Store an assertion and deliver it to live subscribers.
    ///
    /// Returns false if an assertion with the same id was already stored.
    pub fn publish(&self, event: AdminAssertion) -> bool {
        match self.events.entry(event.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                // Sent under the shard lock so a racing duplicate cannot also deliver
                slot.insert(event.clone());
                let _ = self.tx.send(event);
                true
            }
        }
    }

    /// Simulate the relay going away or coming back. Affects queries only.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl std::fmt::Debug for MemoryRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRelay")
            .field("name", &self.name)
            .field("events", &self.events.len())
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

#[async_trait]
impl RelayClient for MemoryRelay {
    async fn query(&self, filter: &AssertionFilter) -> Result<Vec<AdminAssertion>, RelayError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(RelayError::Unavailable(self.name.clone()));
        }

        Ok(self
            .events
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn subscribe(&self, filter: AssertionFilter) -> Result<AssertionStream, RelayError> {
        let rx = self.tx.subscribe();
        let name = self.name.clone();

        let events = stream::unfold(rx, move |mut rx| {
            let name = name.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => return Some((event, rx)),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(relay = %name, skipped, "Subscriber lagged, assertions dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(events
            .filter(move |event| future::ready(filter.matches(event)))
            .boxed())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Fan-out over several relays.
///
/// Queries go to every relay concurrently and are merged and de-duplicated by
/// id. A query only fails when every relay failed.
pub struct RelayPool {
    relays: Vec<SharedRelay>,
}

impl RelayPool {
    pub fn new(relays: Vec<SharedRelay>) -> Self {
        Self { relays }
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }
}

#[async_trait]
impl RelayClient for RelayPool {
    async fn query(&self, filter: &AssertionFilter) -> Result<Vec<AdminAssertion>, RelayError> {
        if self.relays.is_empty() {
            return Err(RelayError::NoRelays);
        }

        let results = join_all(self.relays.iter().map(|relay| relay.query(filter))).await;

        let mut merged: Vec<AdminAssertion> = Vec::new();
        let mut seen = HashSet::new();
        let mut failures = Vec::new();
        for (relay, result) in self.relays.iter().zip(results) {
            match result {
                Ok(events) => {
                    debug!(relay = relay.name(), count = events.len(), "Relay answered");
                    for event in events {
                        if seen.insert(event.id.clone()) {
                            merged.push(event);
                        }
                    }
                }
                Err(e) => {
                    warn!(relay = relay.name(), "Relay query failed: {}", e);
                    failures.push(relay.name().to_string());
                }
            }
        }

        if failures.len() == self.relays.len() {
            return Err(RelayError::Unavailable(failures.join(", ")));
        }
        Ok(merged)
    }

    fn subscribe(&self, filter: AssertionFilter) -> Result<AssertionStream, RelayError> {
        if self.relays.is_empty() {
            return Err(RelayError::NoRelays);
        }

        let streams = self
            .relays
            .iter()
            .filter_map(|relay| match relay.subscribe(filter.clone()) {
                Ok(stream) => Some(stream),
                Err(e) => {
                    warn!(relay = relay.name(), "Relay subscription failed: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();

        if streams.is_empty() {
            return Err(RelayError::Unavailable("all relays".to_string()));
        }
        Ok(stream::select_all(streams).boxed())
    }

    fn name(&self) -> &str {
        "pool"
    }
}
