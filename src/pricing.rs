//! Pricing catalog and promotional overlay.
//!
//! The catalog is built once from [`PricingConfig`] and never mutated. A
//! promotion is applied at read time to a fresh copy of the tiers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::PricingConfig;

pub const CURRENCY: &str = "USD";

/// Message and project quotas; `-1` means unlimited.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub messages_per_month: i64,
    pub messages_per_day: i64,
    pub projects: i64,
}

/// Billing-provider price references for one tier.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PriceIds {
    pub monthly: String,
    pub yearly: String,
}

impl PriceIds {
    pub fn new(monthly: impl Into<String>, yearly: impl Into<String>) -> Self {
        Self {
            monthly: monthly.into(),
            yearly: yearly.into(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PricingTier {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price_monthly: f64,
    pub price_yearly: f64,
    pub currency: String,
    pub features: Vec<String>,
    pub limits: TierLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_ids: Option<PriceIds>,
    pub recommended: bool,
    pub popular: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_promotional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price_monthly: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price_yearly: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_expiry: Option<DateTime<Utc>>,
}

struct TierSpec {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    monthly: f64,
    yearly: f64,
    features: &'static [&'static str],
    limits: (i64, i64, i64),
    recommended: bool,
    popular: bool,
}

impl TierSpec {
    fn build(&self, price_ids: Option<PriceIds>) -> PricingTier {
        PricingTier {
            id: self.id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            price_monthly: self.monthly,
            price_yearly: self.yearly,
            currency: CURRENCY.to_string(),
            features: self.features.iter().map(|f| f.to_string()).collect(),
            limits: TierLimits {
                messages_per_month: self.limits.0,
                messages_per_day: self.limits.1,
                projects: self.limits.2,
            },
            price_ids,
            recommended: self.recommended,
            popular: self.popular,
            is_promotional: false,
            original_price_monthly: None,
            original_price_yearly: None,
            promotion_expiry: None,
        }
    }
}

const STARTER: TierSpec = TierSpec {
    id: "starter",
    name: "Starter",
    description: "For individuals getting started with the assistant",
    monthly: 9.99,
    yearly: 99.99,
    features: &[
        "500 messages per month",
        "Standard response speed",
        "Up to 3 projects",
        "Email support",
    ],
    limits: (500, 50, 3),
    recommended: false,
    popular: false,
};

const PRO: TierSpec = TierSpec {
    id: "pro",
    name: "Pro",
    description: "For professionals who rely on the assistant every day",
    monthly: 19.99,
    yearly: 199.99,
    features: &[
        "2,000 messages per month",
        "Priority response speed",
        "Up to 10 projects",
        "Conversation history export",
        "Priority email support",
    ],
    limits: (2000, 200, 10),
    recommended: true,
    popular: true,
};

const ENTERPRISE: TierSpec = TierSpec {
    id: "enterprise",
    name: "Enterprise",
    description: "For teams that need unlimited usage and dedicated support",
    monthly: 49.99,
    yearly: 499.99,
    features: &[
        "Unlimited messages",
        "Fastest response speed",
        "Unlimited projects",
        "Team management",
        "Dedicated support",
    ],
    limits: (-1, -1, -1),
    recommended: false,
    popular: false,
};

const FREE: TierSpec = TierSpec {
    id: "free",
    name: "Free",
    description: "Try the assistant at no cost",
    monthly: 0.0,
    yearly: 0.0,
    features: &["50 messages per month", "Standard response speed", "1 project"],
    limits: (50, 10, 1),
    recommended: false,
    popular: false,
};

// Promotional (monthly, yearly) prices by tier id
const PROMO_PRICES: [(&str, f64, f64); 3] = [
    ("starter", 7.49, 74.99),
    ("pro", 14.99, 149.99),
    ("enterprise", 39.99, 399.99),
];

#[derive(Debug, Clone)]
pub struct Promotion {
    pub expires_at: DateTime<Utc>,
    pub prices: BTreeMap<String, (f64, f64)>,
}

impl Promotion {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    fn apply(&self, tier: &mut PricingTier) {
        if let Some(&(monthly, yearly)) = self.prices.get(&tier.id) {
            tier.original_price_monthly = Some(tier.price_monthly);
            tier.original_price_yearly = Some(tier.price_yearly);
            tier.price_monthly = monthly;
            tier.price_yearly = yearly;
            tier.is_promotional = true;
            tier.promotion_expiry = Some(self.expires_at);
        }
    }
}

pub struct PricingResolver {
    tiers: BTreeMap<String, PricingTier>,
    free: PricingTier,
    promotion: Promotion,
}

impl PricingResolver {
    pub fn new(config: &PricingConfig) -> Self {
        let tiers = [
            STARTER.build(Some(config.starter.clone())),
            PRO.build(Some(config.pro.clone())),
            ENTERPRISE.build(Some(config.enterprise.clone())),
        ]
        .into_iter()
        .map(|tier| (tier.id.clone(), tier))
        .collect();

        let promotion = Promotion {
            expires_at: config.promo_expiry,
            prices: PROMO_PRICES
                .iter()
                .map(|&(id, monthly, yearly)| (id.to_string(), (monthly, yearly)))
                .collect(),
        };

        Self {
            tiers,
            free: FREE.build(None),
            promotion,
        }
    }

    pub fn is_promotion_active(&self, now: DateTime<Utc>) -> bool {
        self.promotion.is_active(now)
    }

    /// Paid tiers keyed by id, with promotional prices when requested and active.
    pub fn list_tiers(&self, include_promo: bool, now: DateTime<Utc>) -> BTreeMap<String, PricingTier> {
        let mut tiers = self.tiers.clone();
        if include_promo && self.is_promotion_active(now) {
            tiers.values_mut().for_each(|tier| self.promotion.apply(tier));
        }
        tiers
    }

    /// Case-insensitive lookup; `None` for empty or unknown ids.
    pub fn get_tier(&self, id: &str, include_promo: bool, now: DateTime<Utc>) -> Option<PricingTier> {
        let id = id.trim().to_lowercase();
        if id.is_empty() {
            return None;
        }
        self.list_tiers(include_promo, now).remove(&id)
    }

    pub fn free_tier(&self) -> &PricingTier {
        &self.free
    }
}
