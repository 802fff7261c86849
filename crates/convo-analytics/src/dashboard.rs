//! Wires the filter store, domain stores, sync registry and tabs together.

use crate::config::DashboardConfig;
use crate::domains::{
    AccountsService, ChatEventsService, ConversationService, CostService, DomainKey,
    NotificationService, RestService,
};
use crate::filters::{FilterError, FilterStore};
use crate::metrics::{
    calculate_accounts_metrics, calculate_chat_event_distribution,
    calculate_conversation_metrics, calculate_cost_breakdown, calculate_notification_metrics,
    AccountsMetrics, ConversationMetrics, CostBreakdown, EventShare, NotificationMetrics,
};
use crate::service::{ApiClient, ResponseCache, ServiceError};
use crate::store::{DomainState, DomainStore, FetchService, Refreshable};
use crate::sync::{SyncGuard, SyncManager};
use crate::tabs::{TabKey, TabManager};
use serde::Serialize;
use std::sync::Arc;

pub struct Dashboard {
    config: DashboardConfig,
    filters: Arc<FilterStore>,
    cache: Arc<ResponseCache>,
    conversations: Arc<DomainStore<ConversationService>>,
    accounts: Arc<DomainStore<AccountsService>>,
    notifications: Arc<DomainStore<NotificationService>>,
    chat_events: Arc<DomainStore<ChatEventsService>>,
    costs: Arc<DomainStore<CostService>>,
    sync: Arc<SyncManager>,
    tabs: TabManager,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Result<Self, ServiceError> {
        let filters = Arc::new(FilterStore::new().with_window_days(config.default_window_days));
        // Apply the configured window right away.
        filters.reset_filters();

        let cache = Arc::new(ResponseCache::new(config.cache_ttl()));
        let api = ApiClient::new(
            &config.api_base_url,
            config.api_token.clone(),
            config.request_timeout(),
            cache.clone(),
        )?;

        fn store<S: FetchService>(
            key: DomainKey,
            filters: &Arc<FilterStore>,
            service: S,
        ) -> Arc<DomainStore<S>> {
            Arc::new(DomainStore::new(key, filters.clone(), service))
        }

        let conversations: Arc<DomainStore<ConversationService>> = store(
            DomainKey::Conversations,
            &filters,
            RestService::new(api.clone(), DomainKey::Conversations.endpoint()),
        );
        let accounts: Arc<DomainStore<AccountsService>> = store(
            DomainKey::Accounts,
            &filters,
            RestService::new(api.clone(), DomainKey::Accounts.endpoint()),
        );
        let notifications: Arc<DomainStore<NotificationService>> = store(
            DomainKey::Notifications,
            &filters,
            RestService::new(api.clone(), DomainKey::Notifications.endpoint()),
        );
        let chat_events: Arc<DomainStore<ChatEventsService>> = store(
            DomainKey::ChatEvents,
            &filters,
            RestService::new(api.clone(), DomainKey::ChatEvents.endpoint()),
        );
        let costs: Arc<DomainStore<CostService>> = store(
            DomainKey::Costs,
            &filters,
            RestService::new(api, DomainKey::Costs.endpoint()),
        );

        let tabs = TabManager::new(config.initial_tab)
            .with_store(conversations.clone())
            .with_store(accounts.clone())
            .with_store(notifications.clone())
            .with_store(chat_events.clone())
            .with_store(costs.clone())
            .with_cache(cache.clone());

        let sync = SyncManager::new(filters.clone());

        Ok(Self {
            config,
            filters,
            cache,
            conversations,
            accounts,
            notifications,
            chat_events,
            costs,
            sync,
            tabs,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn filters(&self) -> &Arc<FilterStore> {
        &self.filters
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }

    pub fn sync(&self) -> &Arc<SyncManager> {
        &self.sync
    }

    pub fn conversations(&self) -> &Arc<DomainStore<ConversationService>> {
        &self.conversations
    }

    pub fn accounts(&self) -> &Arc<DomainStore<AccountsService>> {
        &self.accounts
    }

    pub fn notifications(&self) -> &Arc<DomainStore<NotificationService>> {
        &self.notifications
    }

    pub fn chat_events(&self) -> &Arc<DomainStore<ChatEventsService>> {
        &self.chat_events
    }

    pub fn costs(&self) -> &Arc<DomainStore<CostService>> {
        &self.costs
    }

    pub fn store(&self, key: DomainKey) -> Arc<dyn Refreshable> {
        match key {
            DomainKey::Conversations => self.conversations.clone(),
            DomainKey::Accounts => self.accounts.clone(),
            DomainKey::Notifications => self.notifications.clone(),
            DomainKey::ChatEvents => self.chat_events.clone(),
            DomainKey::Costs => self.costs.clone(),
        }
    }

    /// Keep `key` synced with the filters until the guard drops.
    pub fn mount(&self, key: DomainKey) -> SyncGuard {
        self.sync.mount(self.store(key))
    }

    /// Mount every domain `tab` renders.
    pub fn mount_tab(&self, tab: TabKey) -> Vec<SyncGuard> {
        tab.domains().into_iter().map(|key| self.mount(key)).collect()
    }

    /// Check the current range against the active tab's picker limit.
    pub fn validate_range(&self) -> Result<(), FilterError> {
        self.config
            .range_policy(self.tabs.active_tab())
            .validate(&self.filters.filters())
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            active_tab: self.tabs.active_tab(),
            url: self.filters.url_params().to_query_string(),
            conversations: DomainView::derive(&self.conversations.state(), |d| {
                calculate_conversation_metrics(d)
            }),
            accounts: DomainView::derive(&self.accounts.state(), |d| {
                calculate_accounts_metrics(&d.accounts)
            }),
            notifications: DomainView::derive(&self.notifications.state(), |d| {
                calculate_notification_metrics(d)
            }),
            chat_events: DomainView::derive(&self.chat_events.state(), |d| {
                calculate_chat_event_distribution(d)
            }),
            costs: DomainView::derive(&self.costs.state(), |d| calculate_cost_breakdown(d)),
        }
    }
}

/// Render-ready state of one domain.
#[derive(Debug, Clone, Serialize)]
pub struct DomainView<M> {
    pub loading: bool,
    pub error: Option<String>,
    pub metrics: Option<M>,
}

impl<M> DomainView<M> {
    fn derive<T>(state: &DomainState<T>, compute: impl FnOnce(&T) -> M) -> Self {
        Self {
            loading: state.loading,
            error: state.error.clone(),
            metrics: state.data.as_deref().map(compute),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub active_tab: TabKey,
    pub url: String,
    pub conversations: DomainView<ConversationMetrics>,
    pub accounts: DomainView<AccountsMetrics>,
    pub notifications: DomainView<NotificationMetrics>,
    pub chat_events: DomainView<Vec<EventShare>>,
    pub costs: DomainView<CostBreakdown>,
}

impl DashboardSnapshot {
    /// JSON for one domain's view.
    pub fn domain_json(&self, key: DomainKey) -> serde_json::Result<serde_json::Value> {
        match key {
            DomainKey::Conversations => serde_json::to_value(&self.conversations),
            DomainKey::Accounts => serde_json::to_value(&self.accounts),
            DomainKey::Notifications => serde_json::to_value(&self.notifications),
            DomainKey::ChatEvents => serde_json::to_value(&self.chat_events),
            DomainKey::Costs => serde_json::to_value(&self.costs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::{AccountChannel, AccountRecord, AccountsAnalytics, ChannelType};
    use crate::filters::FilterPatch;
    use chrono::Duration;

    #[test]
    fn test_new_uses_configured_window() {
        let config = DashboardConfig {
            default_window_days: 14,
            ..DashboardConfig::default()
        };
        let dashboard = Dashboard::new(config).unwrap();
        assert_eq!(dashboard.filters().filters().span_days(), 14);
        assert_eq!(dashboard.tabs().active_tab(), TabKey::Overview);
    }

    #[test]
    fn test_store_lookup_matches_key() {
        let dashboard = Dashboard::new(DashboardConfig::default()).unwrap();
        for key in DomainKey::ALL {
            assert_eq!(dashboard.store(key).key(), key);
        }
    }

    #[test]
    fn test_snapshot_derives_metrics_from_data() {
        let dashboard = Dashboard::new(DashboardConfig::default()).unwrap();
        dashboard.accounts().set_data(Some(AccountsAnalytics {
            accounts: vec![AccountRecord {
                onboarding_current_state: Some("COMPLETED".to_string()),
                channels: vec![AccountChannel {
                    channel_type: ChannelType::Web,
                    active: true,
                }],
                ..AccountRecord::default()
            }],
        }));
        dashboard.costs().set_error(Some("HTTP 500".to_string()));

        let snapshot = dashboard.snapshot();
        let accounts = snapshot.accounts.metrics.unwrap();
        assert_eq!(accounts.configuration_status.completed, 1);
        assert_eq!(accounts.channel_distribution.web.percentage, 100.0);
        assert!(snapshot.conversations.metrics.is_none());
        assert_eq!(snapshot.costs.error.as_deref(), Some("HTTP 500"));
        assert!(snapshot.url.starts_with("startDate="));
        let json = snapshot.domain_json(DomainKey::Costs).unwrap();
        assert_eq!(json["error"], "HTTP 500");
        assert!(json["metrics"].is_null());
    }

    #[test]
    fn test_validate_range_depends_on_tab() {
        let dashboard = Dashboard::new(DashboardConfig::default()).unwrap();
        let end = dashboard.filters().filters().end_date;
        dashboard.filters().update_filters(FilterPatch {
            start_date: Some(end - Duration::days(60)),
            ..FilterPatch::default()
        });
        assert!(dashboard.validate_range().is_ok());
        dashboard.tabs().set_active_tab(TabKey::Accounts);
        assert!(dashboard.validate_range().is_err());
    }
}
