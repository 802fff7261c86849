use super::{percentage, rank_counts, round2, RankedCount};
use crate::domains::{ConversationAnalytics, DailyCount};
use serde::{Deserialize, Serialize};

/// Rankings shown on the conversation tab.
pub const TOP_N: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMetrics {
    pub total: u64,
    pub resolution_rate: f64,
    pub escalation_rate: f64,
    pub average_duration_minutes: f64,
    pub daily_average: f64,
    pub busiest_day: Option<DailyCount>,
    pub top_channels: Vec<RankedCount>,
    pub top_accounts: Vec<RankedCount>,
}

pub fn calculate_conversation_metrics(data: &ConversationAnalytics) -> ConversationMetrics {
    let total = data.total_conversations;

    let daily_average = if data.daily.is_empty() {
        0.0
    } else {
        let sum: u64 = data.daily.iter().map(|d| d.count).sum();
        round2(sum as f64 / data.daily.len() as f64)
    };

    // Earliest date wins ties.
    let busiest_day = data
        .daily
        .iter()
        .max_by(|a, b| a.count.cmp(&b.count).then_with(|| b.date.cmp(&a.date)))
        .cloned();

    ConversationMetrics {
        total,
        resolution_rate: percentage(data.resolved_conversations, total),
        escalation_rate: percentage(data.escalated_conversations, total),
        average_duration_minutes: round2(data.average_duration_seconds / 60.0),
        daily_average,
        busiest_day,
        top_channels: rank_counts(&data.by_channel, TOP_N),
        top_accounts: rank_counts(&data.by_account, TOP_N),
    }
}
