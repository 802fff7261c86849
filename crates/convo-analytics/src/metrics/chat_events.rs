use super::rank_counts;
use crate::domains::ChatEventsAnalytics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventShare {
    pub event_type: String,
    pub count: u64,
    pub percentage: f64,
}

/// Every event type with its share of all events, largest first.
pub fn calculate_chat_event_distribution(data: &ChatEventsAnalytics) -> Vec<EventShare> {
    rank_counts(&data.by_event_type, usize::MAX)
        .into_iter()
        .map(|r| EventShare {
            event_type: r.name,
            count: r.count,
            percentage: r.percentage,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::NamedCount;

    #[test]
    fn test_distribution() {
        let data = ChatEventsAnalytics {
            by_event_type: vec![
                NamedCount {
                    name: "message_sent".to_string(),
                    count: 30,
                },
                NamedCount {
                    name: "handoff".to_string(),
                    count: 10,
                },
            ],
        };
        let dist = calculate_chat_event_distribution(&data);
        assert_eq!(dist.len(), 2);
        assert_eq!(dist[0].event_type, "message_sent");
        assert_eq!(dist[0].percentage, 75.0);
        assert_eq!(dist[1].percentage, 25.0);
    }

    #[test]
    fn test_empty() {
        assert!(calculate_chat_event_distribution(&ChatEventsAnalytics::default()).is_empty());
    }
}
