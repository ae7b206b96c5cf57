// File: clawbot-common/src/models/prize.rs

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::delivery::DeliveryResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrizeType {
    Digital,
    Physical,
}

impl fmt::Display for PrizeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrizeType::Digital => write!(f, "digital"),
            PrizeType::Physical => write!(f, "physical"),
        }
    }
}

/// One SKU in the depletable inventory. `stock` is the single source of
/// truth for availability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeItem {
    pub id: String,
    #[serde(rename = "type")]
    pub prize_type: PrizeType,
    pub name: String,
    /// Face value in whole units of `currency`.
    pub value: u64,
    pub currency: String,
    pub category: String,
    /// Key of the delivery provider (e.g. "steam", "tillo", "internal").
    pub provider: String,
    #[serde(default)]
    pub image: String,
    pub stock: u32,
    #[serde(default)]
    pub redemptions: u32,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PrizeItem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        prize_type: PrizeType,
        name: &str,
        value: u64,
        currency: &str,
        category: &str,
        provider: &str,
        stock: u32,
    ) -> Self {
        Self {
            id: id.to_string(),
            prize_type,
            name: name.to_string(),
            value,
            currency: currency.to_string(),
            category: category.to_string(),
            provider: provider.to_string(),
            image: String::new(),
            stock,
            redemptions: 0,
            metadata: serde_json::Value::Null,
            created_at: None,
        }
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = image.to_string();
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// The audited result of one win roll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WinDecision {
    pub did_win: bool,
    /// Probability in `[0, 1]` that was in effect for this roll.
    pub win_chance: f64,
    /// The uniform draw in `[0, 1)` that decided the outcome.
    pub roll: f64,
}

impl WinDecision {
    pub fn win_chance_percent(&self) -> String {
        format!("{:.1}%", self.win_chance * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrizeOutcome {
    Win { prize: PrizeItem, message: String },
    Loss { message: String },
    /// The player won but nothing is left to give. Not a loss.
    OutOfStock { message: String },
}

impl PrizeOutcome {
    pub fn message(&self) -> &str {
        match self {
            PrizeOutcome::Win { message, .. }
            | PrizeOutcome::Loss { message }
            | PrizeOutcome::OutOfStock { message } => message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Completed,
    PendingAddress,
    Failed,
}

/// Durable record of a granted prize. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub id: String,
    pub prize_id: String,
    pub prize_name: String,
    pub user_id: String,
    pub username: String,
    #[serde(rename = "type")]
    pub prize_type: PrizeType,
    pub value: u64,
    pub currency: String,
    pub status: RedemptionStatus,
    pub delivery: Option<DeliveryResult>,
    /// Last provider error when `status` is `failed`.
    #[serde(default)]
    pub failure: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RedeemOutcome {
    Redeemed { redemption: Redemption, message: String },
    OutOfStock { message: String },
    DailyLimitReached { message: String },
}

impl RedeemOutcome {
    pub fn message(&self) -> &str {
        match self {
            RedeemOutcome::Redeemed { message, .. }
            | RedeemOutcome::OutOfStock { message }
            | RedeemOutcome::DailyLimitReached { message } => message,
        }
    }

    pub fn redemption(&self) -> Option<&Redemption> {
        match self {
            RedeemOutcome::Redeemed { redemption, .. } => Some(redemption),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrizeFilter {
    #[serde(default, rename = "type")]
    pub prize_type: Option<PrizeType>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub max_value: Option<u64>,
}

impl PrizeFilter {
    pub fn matches(&self, prize: &PrizeItem) -> bool {
        self.prize_type.map_or(true, |t| prize.prize_type == t)
            && self.category.as_deref().map_or(true, |c| prize.category == c)
            && self.max_value.map_or(true, |v| prize.value <= v)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockSummary {
    pub total: usize,
    pub in_stock: usize,
    pub low_stock: usize,
    pub low_stock_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryStatus {
    pub digital: StockSummary,
    pub physical: StockSummary,
    /// Remaining stock value, keyed by currency.
    pub stock_value: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopPrize {
    pub name: String,
    pub redemptions: u32,
    pub stock: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedemptionCounters {
    pub total: u64,
    pub today: u32,
    pub digital: u64,
    pub physical: u64,
    pub losses: u64,
    pub out_of_stock: u64,
    pub failed_deliveries: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrizeDashboard {
    pub redemptions: RedemptionCounters,
    /// Granted value, keyed by currency.
    pub total_value: BTreeMap<String, u64>,
    pub today_value: BTreeMap<String, u64>,
    pub inventory: InventoryStatus,
    pub recent_redemptions: Vec<Redemption>,
    pub top_prizes: Vec<TopPrize>,
    /// Redemptions whose delivery failed after stock was taken.
    pub reconciliation: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
