use crate::tabs::TabKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    ViewConversations,
    ViewCosts,
    ViewAccounts,
    ViewNotifications,
    ViewChatEvents,
    Admin,
}

impl Capability {
    pub fn implies(&self, other: &Capability) -> bool {
        if self == &Capability::Admin {
            return true;
        }
        self == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ViewConversations => "view-conversations",
            Capability::ViewCosts => "view-costs",
            Capability::ViewAccounts => "view-accounts",
            Capability::ViewNotifications => "view-notifications",
            Capability::ViewChatEvents => "view-chat-events",
            Capability::Admin => "admin",
        }
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Capability::ViewConversations,
            Capability::ViewCosts,
            Capability::ViewAccounts,
            Capability::ViewNotifications,
            Capability::ViewChatEvents,
            Capability::Admin,
        ]
        .into_iter()
        .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("unknown capability: {}", s))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    capabilities: HashSet<Capability>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admin() -> Self {
        [Capability::Admin].into_iter().collect()
    }

    pub fn grant(&mut self, cap: Capability) {
        self.capabilities.insert(cap);
    }

    pub fn has(&self, cap: &Capability) -> bool {
        self.capabilities.iter().any(|held| held.implies(cap))
    }

    pub fn has_all(&self, caps: &[Capability]) -> bool {
        caps.iter().all(|c| self.has(c))
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

/// Metric cards a dashboard may show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricCard {
    TotalConversations,
    ResolutionRate,
    TopChannels,
    CostPerConversation,
    CostBreakdown,
    OnboardingStatus,
    ChannelDistribution,
    AutomodeAdoption,
    DeliveryRate,
    ChatEventDistribution,
}

impl MetricCard {
    pub const ALL: [MetricCard; 10] = [
        MetricCard::TotalConversations,
        MetricCard::ResolutionRate,
        MetricCard::TopChannels,
        MetricCard::CostPerConversation,
        MetricCard::CostBreakdown,
        MetricCard::OnboardingStatus,
        MetricCard::ChannelDistribution,
        MetricCard::AutomodeAdoption,
        MetricCard::DeliveryRate,
        MetricCard::ChatEventDistribution,
    ];

    pub fn required(&self) -> &'static [Capability] {
        match self {
            MetricCard::TotalConversations
            | MetricCard::ResolutionRate
            | MetricCard::TopChannels => &[Capability::ViewConversations],
            MetricCard::CostPerConversation => {
                &[Capability::ViewConversations, Capability::ViewCosts]
            }
            MetricCard::CostBreakdown => &[Capability::ViewCosts],
            MetricCard::OnboardingStatus
            | MetricCard::ChannelDistribution
            | MetricCard::AutomodeAdoption => &[Capability::ViewAccounts],
            MetricCard::DeliveryRate => &[Capability::ViewNotifications],
            MetricCard::ChatEventDistribution => &[Capability::ViewChatEvents],
        }
    }

    /// Tab the card is rendered on.
    pub fn tab(&self) -> TabKey {
        match self {
            MetricCard::TotalConversations
            | MetricCard::ResolutionRate
            | MetricCard::TopChannels => TabKey::Conversations,
            MetricCard::CostPerConversation | MetricCard::CostBreakdown => TabKey::Costs,
            MetricCard::OnboardingStatus
            | MetricCard::ChannelDistribution
            | MetricCard::AutomodeAdoption => TabKey::Accounts,
            MetricCard::DeliveryRate => TabKey::Notifications,
            MetricCard::ChatEventDistribution => TabKey::ChatEvents,
        }
    }
}

pub fn tab_requirements(tab: TabKey) -> &'static [Capability] {
    match tab {
        TabKey::Overview | TabKey::Conversations => &[Capability::ViewConversations],
        TabKey::Costs => &[Capability::ViewCosts],
        TabKey::Accounts => &[Capability::ViewAccounts],
        TabKey::Notifications => &[Capability::ViewNotifications],
        TabKey::ChatEvents => &[Capability::ViewChatEvents],
    }
}

pub fn visible_tabs(caps: &CapabilitySet) -> Vec<TabKey> {
    TabKey::ALL
        .into_iter()
        .filter(|tab| caps.has_all(tab_requirements(*tab)))
        .collect()
}

pub fn visible_cards(caps: &CapabilitySet, tab: TabKey) -> Vec<MetricCard> {
    MetricCard::ALL
        .into_iter()
        .filter(|card| card.tab() == tab && caps.has_all(card.required()))
        .collect()
}
