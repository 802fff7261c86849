use super::round2;
use crate::domains::CostAnalytics;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostShare {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub currency: String,
    pub total: f64,
    pub cost_per_conversation: f64,
    pub shares: Vec<CostShare>,
}

pub fn calculate_cost_breakdown(data: &CostAnalytics) -> CostBreakdown {
    let mut shares: Vec<CostShare> = Vec::new();
    for line in &data.lines {
        match shares.iter_mut().find(|s| s.category == line.category) {
            Some(share) => share.amount += line.amount,
            None => shares.push(CostShare {
                category: line.category.clone(),
                amount: line.amount,
                percentage: 0.0,
            }),
        }
    }

    let total: f64 = shares.iter().map(|s| s.amount).sum();
    for share in &mut shares {
        share.percentage = if total > 0.0 {
            round2(share.amount / total * 100.0)
        } else {
            0.0
        };
        share.amount = round2(share.amount);
    }
    shares.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.category.cmp(&b.category))
    });

    let cost_per_conversation = if data.conversations == 0 {
        0.0
    } else {
        round2(total / data.conversations as f64)
    };

    CostBreakdown {
        currency: data.currency.clone(),
        total: round2(total),
        cost_per_conversation,
        shares,
    }
}
