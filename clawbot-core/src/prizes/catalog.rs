//! Starting inventory for a fresh install.

use chrono::{DateTime, Utc};
use serde_json::json;

use clawbot_common::models::{PrizeItem, PrizeType};

pub fn default_catalog(now: DateTime<Utc>) -> Vec<PrizeItem> {
    use PrizeType::{Digital, Physical};

    let items = vec![
        PrizeItem::new("steam_5", Digital, "Steam Wallet $5 USD", 5, "USD", "gaming", "steam", 100)
            .with_image("🎮")
            .with_metadata(json!({ "region": "global" })),
        PrizeItem::new("steam_10", Digital, "Steam Wallet $10 USD", 10, "USD", "gaming", "steam", 50)
            .with_image("🎮")
            .with_metadata(json!({ "region": "global" })),
        PrizeItem::new("steam_25", Digital, "Steam Wallet $25 USD", 25, "USD", "gaming", "steam", 20)
            .with_image("🎮")
            .with_metadata(json!({ "region": "global" })),
        PrizeItem::new("amazon_10", Digital, "Amazon Gift Card $10 USD", 10, "USD", "shopping", "tillo", 30)
            .with_image("📦")
            .with_metadata(json!({ "brands": ["amazon"] })),
        PrizeItem::new("playstation_20", Digital, "PlayStation Store $20 USD", 20, "USD", "gaming", "tillo", 25)
            .with_image("🎮")
            .with_metadata(json!({ "brands": ["playstation"] })),
        PrizeItem::new("merch_sticker_pack", Physical, "Official Sticker Pack", 3_000, "CLP", "merch", "internal", 200)
            .with_image("⭐")
            .with_metadata(json!({ "weight": 50, "dimensions": "15x10x2" })),
        PrizeItem::new("merch_tshirt", Physical, "Official T-Shirt (M/L/XL)", 15_000, "CLP", "merch", "internal", 30)
            .with_image("👕")
            .with_metadata(json!({ "weight": 200, "dimensions": "30x20x5" })),
        PrizeItem::new("tech_mousepad", Physical, "Gaming Mousepad XL", 12_000, "CLP", "tech", "internal", 20)
            .with_image("🖱️")
            .with_metadata(json!({ "weight": 300, "dimensions": "40x30x1" })),
        PrizeItem::new("tech_headset_stand", Physical, "RGB Headset Stand", 25_000, "CLP", "tech", "internal", 10)
            .with_image("🎧")
            .with_metadata(json!({ "weight": 500, "dimensions": "15x15x20" })),
    ];

    items
        .into_iter()
        .map(|mut p| {
            p.created_at = Some(now);
            p
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_unique_ids() {
        let items = default_catalog(Utc::now());
        assert_eq!(items.len(), 9);
        let mut ids: Vec<_> = items.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 9);
        assert!(items.iter().all(|p| p.in_stock() && p.created_at.is_some()));
    }
}
