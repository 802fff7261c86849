use crate::filters::{DateRangePolicy, DEFAULT_WINDOW_DAYS};
use crate::tabs::TabKey;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    /// No timeout unless set; the HTTP client default applies.
    pub request_timeout_secs: Option<u64>,
    pub default_window_days: i64,
    /// Zero disables the response cache.
    pub cache_ttl_secs: u64,
    pub initial_tab: TabKey,
    /// Date picker limit for the overview.
    pub overview_max_span_days: i64,
    /// Date picker limit for the detail tabs.
    pub detail_max_span_days: i64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::from("http://localhost:8080/api"),
            api_token: None,
            request_timeout_secs: None,
            default_window_days: DEFAULT_WINDOW_DAYS,
            cache_ttl_secs: 60,
            initial_tab: TabKey::Overview,
            overview_max_span_days: DateRangePolicy::QUARTER.max_span_days,
            detail_max_span_days: DateRangePolicy::MONTH.max_span_days,
        }
    }
}

impl DashboardConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: DashboardConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: DashboardConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::warn!("Config file not found, using defaults: {}", path.display());
            Ok(Self::default())
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Range policy for a tab's date picker.
    pub fn range_policy(&self, tab: TabKey) -> DateRangePolicy {
        match tab {
            TabKey::Overview => DateRangePolicy::new(self.overview_max_span_days),
            _ => DateRangePolicy::new(self.detail_max_span_days),
        }
    }
}
