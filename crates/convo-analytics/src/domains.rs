//! Metric domains: their filter shapes, payloads, and REST services.

use crate::filters::CommonFilters;
use crate::query::BackendQuery;
use crate::service::{ApiClient, ServiceError};
use crate::store::FetchService;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DomainKey {
    Conversations,
    Accounts,
    Notifications,
    ChatEvents,
    Costs,
}

impl DomainKey {
    pub const ALL: [DomainKey; 5] = [
        DomainKey::Conversations,
        DomainKey::Accounts,
        DomainKey::Notifications,
        DomainKey::ChatEvents,
        DomainKey::Costs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DomainKey::Conversations => "conversations",
            DomainKey::Accounts => "accounts",
            DomainKey::Notifications => "notifications",
            DomainKey::ChatEvents => "chat-events",
            DomainKey::Costs => "costs",
        }
    }

    /// Endpoint path relative to the API base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            DomainKey::Conversations => "analytics/conversations",
            DomainKey::Accounts => "analytics/accounts",
            DomainKey::Notifications => "analytics/notifications",
            DomainKey::ChatEvents => "analytics/chat-events",
            DomainKey::Costs => "analytics/costs",
        }
    }
}

impl fmt::Display for DomainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for DomainKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown domain: {}", s))
    }
}

/// Domain filter shapes serialize themselves as backend query parameters.
pub trait QueryFilters {
    fn to_query(&self) -> BackendQuery;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationFilters {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub enterprise_ids: Vec<String>,
    pub account_ids: Vec<String>,
    pub timezone_offset: i32,
}

impl From<&CommonFilters> for ConversationFilters {
    fn from(f: &CommonFilters) -> Self {
        Self {
            start_date: f.start_date,
            end_date: f.end_date,
            enterprise_ids: f.enterprise_ids.clone(),
            account_ids: f.account_ids.clone(),
            timezone_offset: f.timezone_offset,
        }
    }
}

impl QueryFilters for ConversationFilters {
    fn to_query(&self) -> BackendQuery {
        BackendQuery::new()
            .date("startDate", self.start_date)
            .date("endDate", self.end_date)
            .repeated("enterpriseIds", &self.enterprise_ids)
            .repeated("accountIds", &self.account_ids)
            .int("timezoneOffset", self.timezone_offset as i64)
    }
}

/// Account inventory is not date scoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountsFilters {
    pub enterprise_ids: Vec<String>,
    pub account_ids: Vec<String>,
}

impl From<&CommonFilters> for AccountsFilters {
    fn from(f: &CommonFilters) -> Self {
        Self {
            enterprise_ids: f.enterprise_ids.clone(),
            account_ids: f.account_ids.clone(),
        }
    }
}

impl QueryFilters for AccountsFilters {
    fn to_query(&self) -> BackendQuery {
        BackendQuery::new()
            .repeated("enterpriseIds", &self.enterprise_ids)
            .repeated("accountIds", &self.account_ids)
    }
}

/// Shared by the notification and cost domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateScopedFilters {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub enterprise_ids: Vec<String>,
    pub account_ids: Vec<String>,
}

impl From<&CommonFilters> for DateScopedFilters {
    fn from(f: &CommonFilters) -> Self {
        Self {
            start_date: f.start_date,
            end_date: f.end_date,
            enterprise_ids: f.enterprise_ids.clone(),
            account_ids: f.account_ids.clone(),
        }
    }
}

impl QueryFilters for DateScopedFilters {
    fn to_query(&self) -> BackendQuery {
        BackendQuery::new()
            .date("startDate", self.start_date)
            .date("endDate", self.end_date)
            .repeated("enterpriseIds", &self.enterprise_ids)
            .repeated("accountIds", &self.account_ids)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEventsFilters {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub enterprise_ids: Vec<String>,
    pub account_ids: Vec<String>,
    pub channel_names: Vec<String>,
    pub timezone_offset: i32,
}

impl From<&CommonFilters> for ChatEventsFilters {
    fn from(f: &CommonFilters) -> Self {
        Self {
            start_date: f.start_date,
            end_date: f.end_date,
            enterprise_ids: f.enterprise_ids.clone(),
            account_ids: f.account_ids.clone(),
            channel_names: f.channel_names.clone(),
            timezone_offset: f.timezone_offset,
        }
    }
}

impl QueryFilters for ChatEventsFilters {
    fn to_query(&self) -> BackendQuery {
        BackendQuery::new()
            .date("startDate", self.start_date)
            .date("endDate", self.end_date)
            .repeated("enterpriseIds", &self.enterprise_ids)
            .repeated("accountIds", &self.account_ids)
            .repeated("channelNames", &self.channel_names)
            .int("timezoneOffset", self.timezone_offset as i64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationAnalytics {
    pub total_conversations: u64,
    pub resolved_conversations: u64,
    pub escalated_conversations: u64,
    pub average_duration_seconds: f64,
    pub daily: Vec<DailyCount>,
    pub by_channel: Vec<NamedCount>,
    pub by_account: Vec<NamedCount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Whatsapp,
    Web,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountChannel {
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountRecord {
    pub id: String,
    pub name: String,
    pub enterprise_id: String,
    pub onboarding_current_state: Option<String>,
    pub channels: Vec<AccountChannel>,
    pub automode: bool,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountsAnalytics {
    pub accounts: Vec<AccountRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationAnalytics {
    pub sent: u64,
    pub delivered: u64,
    pub read: u64,
    pub failed: u64,
    pub by_template: Vec<NamedCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatEventsAnalytics {
    pub by_event_type: Vec<NamedCount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostLine {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CostAnalytics {
    pub currency: String,
    pub lines: Vec<CostLine>,
    pub conversations: u64,
}

/// GET service for one domain endpoint.
pub struct RestService<F, D> {
    api: ApiClient,
    path: &'static str,
    _marker: PhantomData<fn() -> (F, D)>,
}

impl<F, D> RestService<F, D> {
    pub fn new(api: ApiClient, path: &'static str) -> Self {
        Self {
            api,
            path,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

#[async_trait]
impl<F, D> FetchService for RestService<F, D>
where
    F: for<'a> From<&'a CommonFilters> + QueryFilters + fmt::Debug + Send + Sync + 'static,
    D: DeserializeOwned + Send + Sync + 'static,
{
    type Filters = F;
    type Data = D;

    fn convert_filters(&self, filters: &CommonFilters) -> F {
        F::from(filters)
    }

    async fn fetch(&self, filters: F) -> Result<D, ServiceError> {
        self.api.get_json(self.path, &filters.to_query()).await
    }
}

pub type ConversationService = RestService<ConversationFilters, ConversationAnalytics>;
pub type AccountsService = RestService<AccountsFilters, AccountsAnalytics>;
pub type NotificationService = RestService<DateScopedFilters, NotificationAnalytics>;
pub type ChatEventsService = RestService<ChatEventsFilters, ChatEventsAnalytics>;
pub type CostService = RestService<DateScopedFilters, CostAnalytics>;
