//! Generic per-domain data store.
//!
//! Each store holds `{data, loading, error}` for one metrics domain and
//! refetches through its [`FetchService`]. Every fetch takes a request
//! token; a response is applied only if its token is still the latest one
//! issued, so a slow older request can never overwrite a newer result.

use crate::domains::DomainKey;
use crate::filters::{CommonFilters, FilterStore};
use crate::service::ServiceError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Converts shared filters to a domain's own shape and fetches its payload.
#[async_trait]
pub trait FetchService: Send + Sync + 'static {
    type Filters: fmt::Debug + Send + Sync + 'static;
    type Data: Send + Sync + 'static;

    /// Pure field mapping, no I/O.
    fn convert_filters(&self, filters: &CommonFilters) -> Self::Filters;

    async fn fetch(&self, filters: Self::Filters) -> Result<Self::Data, ServiceError>;
}

#[derive(Debug, Serialize)]
pub struct DomainState<T> {
    pub data: Option<Arc<T>>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for DomainState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> Clone for DomainState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

/// What happened to one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Failed(String),
    /// A newer request was issued while this one was in flight.
    Discarded,
}

pub struct DomainStore<S: FetchService> {
    key: DomainKey,
    filter_store: Arc<FilterStore>,
    service: S,
    state: watch::Sender<DomainState<S::Data>>,
    latest_request: AtomicU64,
}

impl<S: FetchService> DomainStore<S> {
    pub fn new(key: DomainKey, filter_store: Arc<FilterStore>, service: S) -> Self {
        let (state, _) = watch::channel(DomainState::default());
        Self {
            key,
            filter_store,
            service,
            state,
            latest_request: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> DomainKey {
        self.key
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn state(&self) -> DomainState<S::Data> {
        self.state.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<S::Data>> {
        self.state.borrow().data.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<DomainState<S::Data>> {
        self.state.subscribe()
    }

    /// Fetch with `filters`, or the filter store's current filters.
    pub async fn fetch_data(&self, filters: Option<CommonFilters>) -> FetchOutcome {
        let token = self.begin_fetch();
        self.complete_fetch(token, filters).await
    }

    /// Issue a request token and mark the store loading.
    ///
    /// Tokens are ordered by this call, not by when the fetch runs, so a
    /// caller that spawns the fetch must take the token first.
    pub fn begin_fetch(&self) -> u64 {
        let mut token = 0;
        self.state.send_modify(|state| {
            token = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
            state.loading = true;
            state.error = None;
        });
        token
    }

    /// Run the fetch for a token from [`DomainStore::begin_fetch`]. The
    /// result is applied only if no newer token was issued meanwhile.
    pub async fn complete_fetch(&self, token: u64, filters: Option<CommonFilters>) -> FetchOutcome {
        let filters = filters.unwrap_or_else(|| self.filter_store.filters());

        let domain_filters = self.service.convert_filters(&filters);
        tracing::debug!(domain = %self.key, token, filters = ?domain_filters, "fetching");
        let result = self.service.fetch(domain_filters).await;

        let mut outcome = FetchOutcome::Discarded;
        self.state.send_if_modified(|state| {
            if self.latest_request.load(Ordering::SeqCst) != token {
                return false;
            }
            match result {
                Ok(data) => {
                    state.data = Some(Arc::new(data));
                    state.error = None;
                    outcome = FetchOutcome::Applied;
                }
                Err(ref e) => {
                    let message = e.to_string();
                    state.data = None;
                    state.error = Some(message.clone());
                    outcome = FetchOutcome::Failed(message);
                }
            }
            state.loading = false;
            true
        });

        match outcome {
            FetchOutcome::Discarded => {
                tracing::trace!(domain = %self.key, token, "stale response discarded")
            }
            FetchOutcome::Failed(ref message) => {
                tracing::warn!(domain = %self.key, "fetch failed: {}", message)
            }
            FetchOutcome::Applied => {}
        }
        outcome
    }

    pub async fn refresh_data(&self) -> FetchOutcome {
        self.fetch_data(None).await
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_modify(|state| state.loading = loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.state.send_modify(|state| state.error = error);
    }

    pub fn set_data(&self, data: Option<S::Data>) {
        self.state.send_modify(|state| state.data = data.map(Arc::new));
    }

    /// Drop cached data and invalidate any fetch still in flight.
    pub fn clear_data(&self) {
        self.state.send_modify(|state| {
            self.latest_request.fetch_add(1, Ordering::SeqCst);
            *state = DomainState::default();
        });
    }
}

/// Object-safe view of a domain store used by sync and tab management.
#[async_trait]
pub trait Refreshable: Send + Sync {
    fn key(&self) -> DomainKey;

    fn has_data(&self) -> bool;

    fn is_loading(&self) -> bool;

    /// Reserve a request token; see [`DomainStore::begin_fetch`].
    fn begin_fetch(&self) -> u64;

    async fn complete_fetch(&self, token: u64, filters: Option<CommonFilters>) -> FetchOutcome;

    async fn fetch_with(&self, filters: Option<CommonFilters>) -> FetchOutcome {
        let token = self.begin_fetch();
        self.complete_fetch(token, filters).await
    }

    async fn refresh(&self) -> FetchOutcome {
        self.fetch_with(None).await
    }
}

#[async_trait]
impl<S: FetchService> Refreshable for DomainStore<S> {
    fn key(&self) -> DomainKey {
        self.key
    }

    fn has_data(&self) -> bool {
        self.state.borrow().data.is_some()
    }

    fn is_loading(&self) -> bool {
        DomainStore::is_loading(self)
    }

    fn begin_fetch(&self) -> u64 {
        DomainStore::begin_fetch(self)
    }

    async fn complete_fetch(&self, token: u64, filters: Option<CommonFilters>) -> FetchOutcome {
        DomainStore::complete_fetch(self, token, filters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    struct ScriptedService {
        seen: Mutex<Vec<i32>>,
        fail: bool,
    }

    #[async_trait]
    impl FetchService for ScriptedService {
        type Filters = i32;
        type Data = String;

        fn convert_filters(&self, filters: &CommonFilters) -> i32 {
            filters.timezone_offset
        }

        async fn fetch(&self, filters: i32) -> Result<String, ServiceError> {
            self.seen.lock().unwrap().push(filters);
            if self.fail {
                Err(ServiceError::Rejected("backend down".to_string()))
            } else {
                Ok(format!("tz={}", filters))
            }
        }
    }

    fn store(fail: bool) -> DomainStore<ScriptedService> {
        let filters = Arc::new(FilterStore::with_filters(CommonFilters {
            timezone_offset: 4,
            ..CommonFilters::default()
        }));
        DomainStore::new(
            DomainKey::Conversations,
            filters,
            ScriptedService {
                seen: Mutex::new(Vec::new()),
                fail,
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_uses_filter_store_when_none() {
        let store = store(false);
        assert_eq!(store.refresh_data().await, FetchOutcome::Applied);
        let state = store.state();
        assert_eq!(state.data.as_deref().map(String::as_str), Some("tz=4"));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_fetch_converts_explicit_filters() {
        let store = store(false);
        let filters = CommonFilters {
            timezone_offset: -7,
            ..CommonFilters::default()
        };
        store.fetch_data(Some(filters)).await;
        assert_eq!(*store.service().seen.lock().unwrap(), vec![-7]);
    }

    #[tokio::test]
    async fn test_failure_clears_previous_data() {
        let store = store(true);
        store.set_data(Some("old".to_string()));
        let outcome = store.refresh_data().await;
        assert_eq!(outcome, FetchOutcome::Failed("backend down".to_string()));
        let state = store.state();
        assert!(state.data.is_none());
        assert_eq!(state.error.as_deref(), Some("backend down"));
        assert!(!state.loading);
    }

    #[test]
    fn test_setters() {
        let store = store(false);
        store.set_loading(true);
        store.set_error(Some("x".to_string()));
        store.set_data(Some("d".to_string()));
        let state = store.state();
        assert!(state.loading);
        assert_eq!(state.error.as_deref(), Some("x"));
        assert!(state.data.is_some());

        store.clear_data();
        let state = store.state();
        assert!(state.data.is_none());
        assert!(state.error.is_none());
        assert!(!state.loading);
    }

    #[test]
    fn test_clear_data_after_fetch() {
        let store = store(false);
        let outcome = tokio_test::block_on(store.refresh_data());
        assert_eq!(outcome, FetchOutcome::Applied);
        assert!(store.has_data());

        store.clear_data();
        assert!(!store.has_data());
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_token_order_set_at_begin() {
        let store = store(false);
        let older = store.begin_fetch();
        let newer = store.begin_fetch();
        let with_tz = |tz| CommonFilters {
            timezone_offset: tz,
            ..CommonFilters::default()
        };

        assert_eq!(
            store.complete_fetch(newer, Some(with_tz(2))).await,
            FetchOutcome::Applied
        );
        assert_eq!(
            store.complete_fetch(older, Some(with_tz(1))).await,
            FetchOutcome::Discarded
        );
        assert_eq!(store.data().as_deref().map(String::as_str), Some("tz=2"));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_watch_sees_result() {
        let store = store(false);
        let mut rx = store.watch();
        store.refresh_data().await;
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().data.is_some());
    }

    struct GatedService {
        gates: Mutex<Vec<oneshot::Receiver<String>>>,
    }

    #[async_trait]
    impl FetchService for GatedService {
        type Filters = ();
        type Data = String;

        fn convert_filters(&self, _filters: &CommonFilters) {}

        async fn fetch(&self, _filters: ()) -> Result<String, ServiceError> {
            let gate = self.gates.lock().unwrap().remove(0);
            gate.await
                .map_err(|e| ServiceError::Rejected(e.to_string()))
        }
    }

    #[tokio::test]
    async fn test_older_response_discarded() {
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        let store = Arc::new(DomainStore::new(
            DomainKey::Accounts,
            Arc::new(FilterStore::new()),
            GatedService {
                gates: Mutex::new(vec![first_rx, second_rx]),
            },
        ));

        let older = tokio::spawn({
            let store = store.clone();
            async move { store.refresh_data().await }
        });
        while store.service().gates.lock().unwrap().len() == 2 {
            tokio::task::yield_now().await;
        }
        let newer = tokio::spawn({
            let store = store.clone();
            async move { store.refresh_data().await }
        });
        while !store.service().gates.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }

        second_tx.send("fresh".to_string()).unwrap();
        assert_eq!(newer.await.unwrap(), FetchOutcome::Applied);
        first_tx.send("stale".to_string()).unwrap();
        assert_eq!(older.await.unwrap(), FetchOutcome::Discarded);

        assert_eq!(store.data().as_deref().map(String::as_str), Some("fresh"));
        assert!(!store.is_loading());
    }
}
