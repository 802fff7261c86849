//! Derived metrics computed from raw domain payloads.
//!
//! Everything here is pure: no I/O, no errors, zeros for empty input.

pub mod accounts;
pub mod chat_events;
pub mod conversations;
pub mod costs;
pub mod notifications;

pub use accounts::{calculate_accounts_metrics, AccountsMetrics};
pub use chat_events::{calculate_chat_event_distribution, EventShare};
pub use conversations::{calculate_conversation_metrics, ConversationMetrics};
pub use costs::{calculate_cost_breakdown, CostBreakdown};
pub use notifications::{calculate_notification_metrics, NotificationMetrics};

use crate::domains::NamedCount;
use serde::{Deserialize, Serialize};

/// `part / total * 100`, rounded to two decimals. Zero when `total` is zero.
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2(part as f64 / total as f64 * 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCount {
    pub rank: usize,
    pub name: String,
    pub count: u64,
    pub percentage: f64,
}

/// Rank by count descending, then name ascending; keep the first `limit`.
/// Entries with the same name are summed first.
pub fn rank_counts(counts: &[NamedCount], limit: usize) -> Vec<RankedCount> {
    let mut merged: Vec<NamedCount> = Vec::with_capacity(counts.len());
    for entry in counts {
        match merged.iter_mut().find(|m| m.name == entry.name) {
            Some(existing) => existing.count += entry.count,
            None => merged.push(entry.clone()),
        }
    }
    let total: u64 = merged.iter().map(|c| c.count).sum();
    merged.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

    merged
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, c)| RankedCount {
            rank: i + 1,
            percentage: percentage(c.count, total),
            name: c.name,
            count: c.count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nc(name: &str, count: u64) -> NamedCount {
        NamedCount {
            name: name.to_string(),
            count,
        }
    }

    #[test]
    fn test_percentage_zero_total() {
        assert_eq!(percentage(5, 0), 0.0);
    }

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
    }

    #[test]
    fn test_rank_counts_orders_and_merges() {
        let ranked = rank_counts(&[nc("web", 3), nc("whatsapp", 5), nc("web", 2), nc("api", 5)], 10);
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["api", "web", "whatsapp"]);
        assert_eq!(ranked[1].count, 5);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
        assert_eq!(ranked[0].percentage, 33.33);
    }

    #[test]
    fn test_rank_counts_limit() {
        let ranked = rank_counts(&[nc("a", 1), nc("b", 2), nc("c", 3)], 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].name, "c");
        // Share is computed against every entry, not only the kept ones.
        assert_eq!(ranked[0].percentage, 50.0);
    }
}
