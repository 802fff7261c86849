//! Conversation analytics dashboard client: shared filters, per-domain stores kept in sync
//! with them, tab-scoped refreshes, and the metrics derived from each domain's payload.

pub mod capability;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod domains;
pub mod filters;
pub mod metrics;
pub mod query;
pub mod service;
pub mod store;
pub mod sync;
pub mod tabs;

pub use capability::{Capability, CapabilitySet, MetricCard};
pub use config::DashboardConfig;
pub use dashboard::{Dashboard, DashboardSnapshot, DomainView};
pub use domains::{DomainKey, QueryFilters, RestService};
pub use filters::{CommonFilters, FilterError, FilterPatch, FilterStore, UrlParams};
pub use service::{ApiClient, ApiResponse, CacheLayer, ResponseCache, ServiceError};
pub use store::{DomainState, DomainStore, FetchOutcome, FetchService, Refreshable};
pub use sync::{SyncGuard, SyncManager};
pub use tabs::{RefreshReport, TabError, TabKey, TabManager};
