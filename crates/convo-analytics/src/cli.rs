use crate::capability::{visible_cards, visible_tabs, Capability, CapabilitySet};
use crate::config::DashboardConfig;
use crate::dashboard::Dashboard;
use crate::domains::{AccountRecord, AccountsAnalytics, DomainKey};
use crate::filters::{parse_query_string, parse_url_date, parse_url_params, FilterPatch, FilterStore};
use crate::metrics::calculate_accounts_metrics;
use crate::tabs::TabKey;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "convo-analytics")]
#[command(about = "Conversation analytics dashboard client", long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value = "/etc/convo-analytics/dashboard.toml")]
    pub config: PathBuf,

    /// Overrides `api_base_url` from the config file.
    #[arg(short, long)]
    pub server: Option<String>,

    #[arg(short, long, env = "CONVO_API_TOKEN")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Normalize a dashboard URL query string.
    Url { query: String },
    /// Fetch one domain and print its derived metrics.
    Fetch {
        domain: DomainKey,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Refresh a tab (or every domain) and print the dashboard snapshot.
    Refresh {
        #[arg(long)]
        tab: Option<TabKey>,
        #[arg(long)]
        all: bool,
        #[arg(long)]
        clear_cache: bool,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Compute account metrics from a JSON export.
    AccountsReport { file: PathBuf },
    /// List the tabs and cards a capability set can see.
    Tabs {
        #[arg(long = "capability", value_delimiter = ',')]
        capabilities: Vec<Capability>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Dashboard URL query string, applied before the other flags.
    #[arg(long)]
    pub query: Option<String>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
    #[arg(long = "enterprise")]
    pub enterprises: Vec<String>,
    #[arg(long = "account")]
    pub accounts: Vec<String>,
    #[arg(long = "channel")]
    pub channels: Vec<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub timezone_offset: Option<i32>,
}

impl FilterArgs {
    pub fn to_patch(&self) -> Result<FilterPatch> {
        let mut patch = match self.query {
            Some(ref query) => parse_url_params(parse_query_string(query)),
            None => FilterPatch::default(),
        };
        if let Some(ref start) = self.start {
            patch.start_date = Some(
                parse_url_date(start)
                    .ok_or_else(|| anyhow::anyhow!("Invalid start date: {}", start))?,
            );
        }
        if let Some(ref end) = self.end {
            patch.end_date =
                Some(parse_url_date(end).ok_or_else(|| anyhow::anyhow!("Invalid end date: {}", end))?);
        }
        if !self.enterprises.is_empty() {
            patch.enterprise_ids = Some(self.enterprises.clone());
        }
        if !self.accounts.is_empty() {
            patch.account_ids = Some(self.accounts.clone());
        }
        if !self.channels.is_empty() {
            patch.channel_names = Some(self.channels.clone());
        }
        if self.timezone_offset.is_some() {
            patch.timezone_offset = self.timezone_offset;
        }
        Ok(patch)
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Url { ref query } => self.url(query),
            Command::Fetch {
                domain,
                ref filters,
            } => self.fetch(domain, filters).await,
            Command::Refresh {
                tab,
                all,
                clear_cache,
                ref filters,
            } => self.refresh(tab, all, clear_cache, filters).await,
            Command::AccountsReport { ref file } => self.accounts_report(file),
            Command::Tabs { ref capabilities } => self.tabs(capabilities),
        }
    }

    fn load_config(&self) -> Result<DashboardConfig> {
        let mut config = DashboardConfig::load_or_default(&self.config)?;
        if let Some(ref server) = self.server {
            config.api_base_url = server.clone();
        }
        if self.token.is_some() {
            config.api_token = self.token.clone();
        }
        Ok(config)
    }

    fn dashboard(&self, filters: &FilterArgs) -> Result<Dashboard> {
        let dashboard = Dashboard::new(self.load_config()?)?;
        let patch = filters.to_patch()?;
        if !patch.is_empty() {
            dashboard.filters().set_filters(patch);
        }
        if let Err(e) = dashboard.validate_range() {
            tracing::warn!("{}", e);
        }
        Ok(dashboard)
    }

    fn url(&self, query: &str) -> Result<()> {
        let store = FilterStore::new();
        let applied = store.initialize_from_query(query);
        if !applied {
            tracing::info!("No recognized filter values in query, showing defaults");
        }
        println!("{}", store.url_params().to_query_string());
        println!("{}", serde_json::to_string_pretty(&store.filters())?);
        Ok(())
    }

    async fn fetch(&self, domain: DomainKey, filters: &FilterArgs) -> Result<()> {
        let dashboard = self.dashboard(filters)?;
        dashboard.store(domain).refresh().await;

        let snapshot = dashboard.snapshot();
        println!("{}", serde_json::to_string_pretty(&snapshot.domain_json(domain)?)?);
        Ok(())
    }

    async fn refresh(
        &self,
        tab: Option<TabKey>,
        all: bool,
        clear_cache: bool,
        filters: &FilterArgs,
    ) -> Result<()> {
        let dashboard = self.dashboard(filters)?;
        if let Some(tab) = tab {
            dashboard.tabs().set_active_tab(tab);
        }

        let report = if all {
            dashboard.tabs().refresh_all_tabs(clear_cache).await?
        } else {
            dashboard.tabs().refresh_active_tab(clear_cache).await?
        };
        for (domain, message) in report.failures() {
            eprintln!("{}: {}", domain, message);
        }

        println!("{}", serde_json::to_string_pretty(&dashboard.snapshot())?);
        Ok(())
    }

    fn accounts_report(&self, file: &Path) -> Result<()> {
        let accounts = read_accounts(file)?;
        let metrics = calculate_accounts_metrics(&accounts);
        println!("{}", serde_json::to_string_pretty(&metrics)?);
        Ok(())
    }

    fn tabs(&self, capabilities: &[Capability]) -> Result<()> {
        let caps: CapabilitySet = capabilities.iter().copied().collect();
        for tab in visible_tabs(&caps) {
            let cards: Vec<String> = visible_cards(&caps, tab)
                .iter()
                .map(|c| format!("{:?}", c))
                .collect();
            println!("{:<15} {}", tab, cards.join(", "));
        }
        Ok(())
    }
}

/// Accepts a bare array of accounts or an `{"accounts": [...]}` object.
pub fn read_accounts(path: &Path) -> Result<Vec<AccountRecord>> {
    let contents = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)?;
    if value.is_array() {
        return Ok(serde_json::from_value(value)?);
    }
    let wrapped: AccountsAnalytics = serde_json::from_value(value)?;
    Ok(wrapped.accounts)
}
