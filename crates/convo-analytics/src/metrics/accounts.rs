use super::percentage;
use crate::domains::{AccountRecord, ChannelType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationStatus {
    pub completed: u64,
    pub failed: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub not_started: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub active: u64,
    pub inactive: u64,
    /// Accounts with the channel configured, active or not.
    pub total: u64,
    /// Share of all accounts that have the channel configured.
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelDistribution {
    pub whatsapp: ChannelStats,
    pub web: ChannelStats,
    pub multi_channel: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomodeAdoption {
    pub enabled: u64,
    pub disabled: u64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsMetrics {
    pub total_accounts: u64,
    pub active_accounts: u64,
    pub inactive_accounts: u64,
    pub configuration_status: ConfigurationStatus,
    pub channel_distribution: ChannelDistribution,
    pub automode: AutomodeAdoption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnboardingBucket {
    Completed,
    Failed,
    Pending,
    InProgress,
    NotStarted,
}

fn onboarding_bucket(state: Option<&str>) -> OnboardingBucket {
    let normalized = state.unwrap_or_default().trim().to_ascii_uppercase().replace('-', "_");
    match normalized.as_str() {
        "COMPLETED" => OnboardingBucket::Completed,
        "FAILED" => OnboardingBucket::Failed,
        "PENDING" => OnboardingBucket::Pending,
        "IN_PROGRESS" => OnboardingBucket::InProgress,
        _ => OnboardingBucket::NotStarted,
    }
}

fn channel_stats(accounts: &[AccountRecord], channel: ChannelType) -> ChannelStats {
    let mut stats = ChannelStats::default();
    for account in accounts {
        let configured: Vec<_> = account
            .channels
            .iter()
            .filter(|c| c.channel_type == channel)
            .collect();
        if configured.is_empty() {
            continue;
        }
        stats.total += 1;
        if configured.iter().any(|c| c.active) {
            stats.active += 1;
        }
    }
    stats.inactive = stats.total - stats.active;
    stats.percentage = percentage(stats.total, accounts.len() as u64);
    stats
}

pub fn calculate_accounts_metrics(accounts: &[AccountRecord]) -> AccountsMetrics {
    let total = accounts.len() as u64;

    let mut status = ConfigurationStatus::default();
    for account in accounts {
        match onboarding_bucket(account.onboarding_current_state.as_deref()) {
            OnboardingBucket::Completed => status.completed += 1,
            OnboardingBucket::Failed => status.failed += 1,
            OnboardingBucket::Pending => status.pending += 1,
            OnboardingBucket::InProgress => status.in_progress += 1,
            OnboardingBucket::NotStarted => status.not_started += 1,
        }
    }

    let multi_channel = accounts
        .iter()
        .filter(|a| a.channels.iter().filter(|c| c.active).count() > 1)
        .count() as u64;

    let automode_enabled = accounts.iter().filter(|a| a.automode).count() as u64;
    let active_accounts = accounts.iter().filter(|a| a.active).count() as u64;

    AccountsMetrics {
        total_accounts: total,
        active_accounts,
        inactive_accounts: total - active_accounts,
        configuration_status: status,
        channel_distribution: ChannelDistribution {
            whatsapp: channel_stats(accounts, ChannelType::Whatsapp),
            web: channel_stats(accounts, ChannelType::Web),
            multi_channel,
        },
        automode: AutomodeAdoption {
            enabled: automode_enabled,
            disabled: total - automode_enabled,
            percentage: percentage(automode_enabled, total),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::AccountChannel;

    fn account(state: Option<&str>, whatsapp: Option<bool>, web: Option<bool>) -> AccountRecord {
        let mut channels = Vec::new();
        if let Some(active) = whatsapp {
            channels.push(AccountChannel {
                channel_type: ChannelType::Whatsapp,
                active,
            });
        }
        if let Some(active) = web {
            channels.push(AccountChannel {
                channel_type: ChannelType::Web,
                active,
            });
        }
        AccountRecord {
            onboarding_current_state: state.map(str::to_string),
            channels,
            ..AccountRecord::default()
        }
    }

    #[test]
    fn test_three_account_scenario() {
        let accounts = vec![
            account(Some("COMPLETED"), Some(true), Some(true)),
            account(Some("FAILED"), Some(false), Some(false)),
            account(Some(""), Some(true), Some(false)),
        ];
        let metrics = calculate_accounts_metrics(&accounts);

        assert_eq!(
            metrics.configuration_status,
            ConfigurationStatus {
                completed: 1,
                failed: 1,
                pending: 0,
                in_progress: 0,
                not_started: 1,
            }
        );
        let channels = metrics.channel_distribution;
        assert_eq!(channels.multi_channel, 1);
        assert_eq!(
            channels.whatsapp,
            ChannelStats {
                active: 2,
                inactive: 1,
                total: 3,
                percentage: 100.0
            }
        );
        assert_eq!(
            channels.web,
            ChannelStats {
                active: 1,
                inactive: 2,
                total: 3,
                percentage: 100.0
            }
        );
    }

    #[test]
    fn test_empty_input_is_zero() {
        let metrics = calculate_accounts_metrics(&[]);
        assert_eq!(metrics, AccountsMetrics::default());
    }

    #[test]
    fn test_onboarding_buckets() {
        assert_eq!(onboarding_bucket(None), OnboardingBucket::NotStarted);
        assert_eq!(onboarding_bucket(Some("pending")), OnboardingBucket::Pending);
        assert_eq!(onboarding_bucket(Some("IN-PROGRESS")), OnboardingBucket::InProgress);
        assert_eq!(onboarding_bucket(Some("in_progress")), OnboardingBucket::InProgress);
        assert_eq!(onboarding_bucket(Some("ARCHIVED")), OnboardingBucket::NotStarted);
    }

    #[test]
    fn test_partial_channel_coverage() {
        let accounts = vec![
            account(None, Some(true), None),
            account(None, None, None),
            account(None, None, Some(true)),
            account(None, Some(false), None),
        ];
        let metrics = calculate_accounts_metrics(&accounts);
        let whatsapp = metrics.channel_distribution.whatsapp;
        assert_eq!(whatsapp.total, 2);
        assert_eq!(whatsapp.active, 1);
        assert_eq!(whatsapp.percentage, 50.0);
        assert_eq!(metrics.channel_distribution.web.percentage, 25.0);
        assert_eq!(metrics.channel_distribution.multi_channel, 0);
    }

    #[test]
    fn test_automode_and_activity() {
        let mut a = account(Some("COMPLETED"), Some(true), None);
        a.automode = true;
        a.active = true;
        let b = account(Some("PENDING"), None, Some(true));
        let metrics = calculate_accounts_metrics(&[a, b]);
        assert_eq!(metrics.automode.enabled, 1);
        assert_eq!(metrics.automode.disabled, 1);
        assert_eq!(metrics.automode.percentage, 50.0);
        assert_eq!(metrics.active_accounts, 1);
        assert_eq!(metrics.inactive_accounts, 1);
        assert_eq!(metrics.total_accounts, 2);
    }
}
