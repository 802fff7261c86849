//! Dashboard tabs and scoped refreshes.

use crate::domains::DomainKey;
use crate::service::CacheLayer;
use crate::store::{FetchOutcome, Refreshable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TabError {
    #[error("refresh of {domain} aborted: {msg}")]
    TaskFailed { domain: DomainKey, msg: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TabKey {
    #[default]
    Overview,
    Conversations,
    Costs,
    Accounts,
    Notifications,
    ChatEvents,
}

impl TabKey {
    pub const ALL: [TabKey; 6] = [
        TabKey::Overview,
        TabKey::Conversations,
        TabKey::Costs,
        TabKey::Accounts,
        TabKey::Notifications,
        TabKey::ChatEvents,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TabKey::Overview => "overview",
            TabKey::Conversations => "conversations",
            TabKey::Costs => "costs",
            TabKey::Accounts => "accounts",
            TabKey::Notifications => "notifications",
            TabKey::ChatEvents => "chat-events",
        }
    }

    /// Domains this tab needs beyond the conversation domain.
    pub fn extra_domains(&self) -> &'static [DomainKey] {
        match self {
            TabKey::Overview | TabKey::Conversations => &[],
            TabKey::Costs => &[DomainKey::Costs],
            TabKey::Accounts => &[DomainKey::Accounts],
            TabKey::Notifications => &[DomainKey::Notifications],
            TabKey::ChatEvents => &[DomainKey::ChatEvents],
        }
    }

    /// Conversation domain first, then the tab's own domains.
    pub fn domains(&self) -> Vec<DomainKey> {
        let mut domains = vec![DomainKey::Conversations];
        domains.extend(
            self.extra_domains()
                .iter()
                .copied()
                .filter(|d| *d != DomainKey::Conversations),
        );
        domains
    }
}

impl fmt::Display for TabKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TabKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TabKey::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tab: {}", s))
    }
}

/// Per-domain results of one refresh batch.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub outcomes: Vec<(DomainKey, FetchOutcome)>,
}

impl RefreshReport {
    pub fn domains(&self) -> Vec<DomainKey> {
        self.outcomes.iter().map(|(k, _)| *k).collect()
    }

    pub fn failures(&self) -> Vec<(DomainKey, String)> {
        self.outcomes
            .iter()
            .filter_map(|(k, o)| match o {
                FetchOutcome::Failed(msg) => Some((*k, msg.clone())),
                _ => None,
            })
            .collect()
    }
}

struct RefreshingFlag<'a>(&'a AtomicBool);

impl<'a> RefreshingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TabManager {
    active: RwLock<TabKey>,
    refreshing: AtomicBool,
    stores: HashMap<DomainKey, Arc<dyn Refreshable>>,
    cache: Option<Arc<dyn CacheLayer>>,
}

impl TabManager {
    pub fn new(initial: TabKey) -> Self {
        Self {
            active: RwLock::new(initial),
            refreshing: AtomicBool::new(false),
            stores: HashMap::new(),
            cache: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn Refreshable>) -> Self {
        self.stores.insert(store.key(), store);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheLayer>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn set_active_tab(&self, tab: TabKey) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = tab;
        tracing::debug!(tab = %tab, "active tab changed");
    }

    pub fn active_tab(&self) -> TabKey {
        *self.active.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Refresh the conversation domain plus the active tab's domains.
    pub async fn refresh_active_tab(&self, clear_cache: bool) -> Result<RefreshReport, TabError> {
        let domains = self.active_tab().domains();
        self.refresh_domains(&domains, clear_cache).await
    }

    /// Refresh every registered domain.
    pub async fn refresh_all_tabs(&self, clear_cache: bool) -> Result<RefreshReport, TabError> {
        let mut domains: Vec<DomainKey> = self.stores.keys().copied().collect();
        domains.sort();
        self.refresh_domains(&domains, clear_cache).await
    }

    async fn refresh_domains(
        &self,
        domains: &[DomainKey],
        clear_cache: bool,
    ) -> Result<RefreshReport, TabError> {
        let _flag = RefreshingFlag::raise(&self.refreshing);

        if clear_cache {
            if let Some(ref cache) = self.cache {
                cache.clear();
            }
        }

        let mut keys = Vec::with_capacity(domains.len());
        let mut handles = Vec::with_capacity(domains.len());
        for key in domains {
            let Some(store) = self.stores.get(key) else {
                tracing::warn!(domain = %key, "no store registered, skipping refresh");
                continue;
            };
            let store = store.clone();
            keys.push(*key);
            handles.push(tokio::spawn(async move { store.refresh().await }));
        }
        tracing::info!(domains = ?keys, "refreshing");

        let results = futures::future::join_all(handles).await;

        let mut report = RefreshReport::default();
        let mut first_error = None;
        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(outcome) => report.outcomes.push((key, outcome)),
                Err(e) => {
                    tracing::error!(domain = %key, "refresh task failed: {}", e);
                    first_error.get_or_insert(TabError::TaskFailed {
                        domain: key,
                        msg: e.to_string(),
                    });
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::CommonFilters;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct Probe {
        key: DomainKey,
        refreshes: AtomicUsize,
        panic: bool,
    }

    fn probe(key: DomainKey) -> Arc<Probe> {
        Arc::new(Probe {
            key,
            refreshes: AtomicUsize::new(0),
            panic: false,
        })
    }

    #[async_trait]
    impl Refreshable for Probe {
        fn key(&self) -> DomainKey {
            self.key
        }

        fn has_data(&self) -> bool {
            false
        }

        fn is_loading(&self) -> bool {
            false
        }

        fn begin_fetch(&self) -> u64 {
            0
        }

        async fn complete_fetch(&self, _token: u64, _filters: Option<CommonFilters>) -> FetchOutcome {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("conversion blew up");
            }
            FetchOutcome::Applied
        }
    }

    struct CountingCache(AtomicUsize);

    impl CacheLayer for CountingCache {
        fn clear(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager_with_all() -> (TabManager, HashMap<DomainKey, Arc<Probe>>) {
        let mut probes = HashMap::new();
        let mut manager = TabManager::new(TabKey::Overview);
        for key in DomainKey::ALL {
            let p = probe(key);
            manager = manager.with_store(p.clone());
            probes.insert(key, p);
        }
        (manager, probes)
    }

    fn count(probes: &HashMap<DomainKey, Arc<Probe>>, key: DomainKey) -> usize {
        probes[&key].refreshes.load(Ordering::SeqCst)
    }

    #[test]
    fn test_tab_domains_table() {
        assert_eq!(TabKey::Overview.domains(), vec![DomainKey::Conversations]);
        assert_eq!(
            TabKey::Accounts.domains(),
            vec![DomainKey::Conversations, DomainKey::Accounts]
        );
        assert_eq!("chat-events".parse::<TabKey>(), Ok(TabKey::ChatEvents));
    }

    #[tokio::test]
    async fn test_notifications_tab_scope() {
        let (manager, probes) = manager_with_all();
        manager.set_active_tab(TabKey::Notifications);
        let report = manager.refresh_active_tab(false).await.unwrap();

        assert_eq!(
            report.domains(),
            vec![DomainKey::Conversations, DomainKey::Notifications]
        );
        assert_eq!(count(&probes, DomainKey::Conversations), 1);
        assert_eq!(count(&probes, DomainKey::Notifications), 1);
        assert_eq!(count(&probes, DomainKey::Accounts), 0);
        assert_eq!(count(&probes, DomainKey::ChatEvents), 0);
        assert_eq!(count(&probes, DomainKey::Costs), 0);
        assert!(!manager.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_all_tabs() {
        let (manager, probes) = manager_with_all();
        let report = manager.refresh_all_tabs(false).await.unwrap();
        assert_eq!(report.outcomes.len(), DomainKey::ALL.len());
        for key in DomainKey::ALL {
            assert_eq!(count(&probes, key), 1);
        }
    }

    #[tokio::test]
    async fn test_cache_cleared_only_when_asked() {
        let cache = Arc::new(CountingCache(AtomicUsize::new(0)));
        let manager = TabManager::new(TabKey::Overview)
            .with_store(probe(DomainKey::Conversations))
            .with_cache(cache.clone());

        manager.refresh_active_tab(false).await.unwrap();
        assert_eq!(cache.0.load(Ordering::SeqCst), 0);
        manager.refresh_active_tab(true).await.unwrap();
        assert_eq!(cache.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_refresh_resets_flag() {
        let broken = Arc::new(Probe {
            key: DomainKey::Accounts,
            refreshes: AtomicUsize::new(0),
            panic: true,
        });
        let healthy = probe(DomainKey::Conversations);
        let manager = TabManager::new(TabKey::Accounts)
            .with_store(broken)
            .with_store(healthy.clone());

        let result = manager.refresh_active_tab(false).await;
        assert!(matches!(
            result,
            Err(TabError::TaskFailed {
                domain: DomainKey::Accounts,
                ..
            })
        ));
        assert_eq!(healthy.refreshes.load(Ordering::SeqCst), 1);
        assert!(!manager.is_refreshing());
    }

    #[tokio::test]
    async fn test_missing_store_skipped() {
        let manager = TabManager::new(TabKey::Costs).with_store(probe(DomainKey::Conversations));
        let report = manager.refresh_active_tab(false).await.unwrap();
        assert_eq!(report.domains(), vec![DomainKey::Conversations]);
    }
}
