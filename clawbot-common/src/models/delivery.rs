// File: clawbot-common/src/models/delivery.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Shipping details supplied by the winner. Everything is optional; a
/// physical prize without `address` and `city` waits for them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryInfo {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl DeliveryInfo {
    pub fn has_shipping_address(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.address) && filled(&self.city)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveryResult {
    Code {
        code: String,
        instructions: String,
    },
    Link {
        url: String,
        instructions: String,
        expires_at: DateTime<Utc>,
    },
    /// No provider is wired for this prize; support hands it out by hand.
    Manual {
        code: String,
        instructions: String,
    },
    PendingAddress {
        message: String,
    },
    Shipping {
        carrier: String,
        tracking_number: Option<String>,
        estimated_delivery: NaiveDate,
        address: DeliveryInfo,
        shipping_cost: u64,
        free_shipping: bool,
    },
}

impl DeliveryResult {
    pub fn is_pending(&self) -> bool {
        matches!(self, DeliveryResult::PendingAddress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_address_is_not_an_address() {
        let info = DeliveryInfo {
            address: Some("  ".into()),
            city: Some("Santiago".into()),
            ..Default::default()
        };
        assert!(!info.has_shipping_address());

        let info = DeliveryInfo {
            address: Some("Av. Siempre Viva 742".into()),
            city: Some("Santiago".into()),
            ..Default::default()
        };
        assert!(info.has_shipping_address());
    }

    #[test]
    fn delivery_result_is_tagged() {
        let res = DeliveryResult::PendingAddress { message: "need it".into() };
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["type"], "pending_address");
    }
}
