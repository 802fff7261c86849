//! Reference-counted filter subscriptions per domain.
//!
//! Any number of consumers may mount the same domain; the registry keeps
//! exactly one filter-store listener per domain while at least one mount
//! is alive, so a filter change costs one fetch per domain.

use crate::domains::DomainKey;
use crate::filters::{CommonFilters, FilterStore, SubscriptionId};
use crate::store::Refreshable;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
struct SyncEntry {
    /// Distinguishes this entry from one dropped by `reset` for the same key.
    id: u64,
    count: usize,
    subscription: Option<SubscriptionId>,
}

pub struct SyncManager {
    filter_store: Arc<FilterStore>,
    entries: Mutex<HashMap<DomainKey, SyncEntry>>,
    next_entry: AtomicU64,
}

impl SyncManager {
    pub fn new(filter_store: Arc<FilterStore>) -> Arc<Self> {
        Arc::new(Self {
            filter_store,
            entries: Mutex::new(HashMap::new()),
            next_entry: AtomicU64::new(1),
        })
    }

    /// Register a consumer of `target`'s domain.
    ///
    /// The first mount fetches once if the store holds no data and is idle,
    /// then subscribes to filter changes. Later mounts only bump the count.
    /// The mount lasts until the returned guard is dropped.
    pub fn mount(self: &Arc<Self>, target: Arc<dyn Refreshable>) -> SyncGuard {
        let key = target.key();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(key).or_insert_with(|| SyncEntry {
            id: self.next_entry.fetch_add(1, Ordering::SeqCst),
            count: 0,
            subscription: None,
        });
        entry.count += 1;

        if entry.count == 1 {
            if !target.has_data() && !target.is_loading() {
                spawn_fetch(target.clone(), None);
            }
            let listener_target = target.clone();
            let id = self.filter_store.subscribe(move |filters: &CommonFilters| {
                spawn_fetch(listener_target.clone(), Some(filters.clone()));
            });
            entry.subscription = Some(id);
            tracing::debug!(domain = %key, "domain subscribed to filters");
        } else {
            tracing::trace!(domain = %key, count = entry.count, "domain mount shared");
        }

        SyncGuard {
            manager: self.clone(),
            key,
            entry: entry.id,
            released: false,
        }
    }

    fn unmount(&self, key: DomainKey, entry_id: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = entries.get_mut(&key).filter(|e| e.id == entry_id) else {
            tracing::trace!(domain = %key, "unmount for a released entry ignored");
            return;
        };
        entry.count = entry.count.saturating_sub(1);
        if entry.count > 0 {
            return;
        }
        if let Some(id) = entry.subscription.take() {
            self.filter_store.unsubscribe(id);
        }
        entries.remove(&key);
        tracing::debug!(domain = %key, "domain unsubscribed from filters");
    }

    /// Live mounts for `key`.
    pub fn subscriber_count(&self, key: DomainKey) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map(|e| e.count)
            .unwrap_or(0)
    }

    pub fn is_subscribed(&self, key: DomainKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map(|e| e.subscription.is_some())
            .unwrap_or(false)
    }

    /// Domains that currently hold a filter listener.
    pub fn active_subscriptions(&self) -> Vec<DomainKey> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<DomainKey> = entries
            .iter()
            .filter(|(_, e)| e.subscription.is_some())
            .map(|(k, _)| *k)
            .collect();
        keys.sort();
        keys
    }

    /// Detach every listener and forget all counts. Guards issued before
    /// the reset become no-ops, even if their domain is mounted again.
    pub fn reset(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in entries.drain() {
            if let Some(id) = entry.subscription {
                self.filter_store.unsubscribe(id);
            }
        }
    }
}

/// Takes the request token before spawning, so fetches rank by the order
/// of the filter changes rather than the order tasks get scheduled.
fn spawn_fetch(target: Arc<dyn Refreshable>, filters: Option<CommonFilters>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let token = target.begin_fetch();
            handle.spawn(async move {
                target.complete_fetch(token, filters).await;
            });
        }
        Err(_) => tracing::warn!(domain = %target.key(), "no tokio runtime, fetch skipped"),
    }
}

/// One mounted consumer. Dropping it unmounts.
pub struct SyncGuard {
    manager: Arc<SyncManager>,
    key: DomainKey,
    entry: u64,
    released: bool,
}

impl SyncGuard {
    pub fn key(&self) -> DomainKey {
        self.key
    }

    pub fn unmount(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.manager.unmount(self.key, self.entry);
        }
    }
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.release();
    }
}
