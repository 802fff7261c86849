use super::{percentage, rank_counts, RankedCount};
use crate::domains::NotificationAnalytics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMetrics {
    pub sent: u64,
    pub delivered: u64,
    pub read: u64,
    pub failed: u64,
    /// delivered / sent
    pub delivery_rate: f64,
    /// read / delivered
    pub read_rate: f64,
    pub failure_rate: f64,
    pub top_templates: Vec<RankedCount>,
}

pub fn calculate_notification_metrics(data: &NotificationAnalytics) -> NotificationMetrics {
    NotificationMetrics {
        sent: data.sent,
        delivered: data.delivered,
        read: data.read,
        failed: data.failed,
        delivery_rate: percentage(data.delivered, data.sent),
        read_rate: percentage(data.read, data.delivered),
        failure_rate: percentage(data.failed, data.sent),
        top_templates: rank_counts(&data.by_template, super::conversations::TOP_N),
    }
}
