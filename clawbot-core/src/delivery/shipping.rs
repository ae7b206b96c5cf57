//! Shipping cost and delivery-date estimates for physical prizes.

use chrono::{Days, NaiveDate};

use crate::config::DeliveryConfig;

fn lookup<T: Copy>(table: &std::collections::HashMap<String, T>, region: Option<&str>, default: T) -> T {
    region
        .map(str::trim)
        .and_then(|r| table.get(r).copied())
        .unwrap_or(default)
}

/// Free above the threshold, otherwise the base cost scaled by region.
pub fn shipping_cost(config: &DeliveryConfig, prize_value: u64, region: Option<&str>) -> u64 {
    if prize_value >= config.free_shipping_threshold {
        return 0;
    }
    let multiplier = lookup(&config.region_multipliers, region, config.default_region_multiplier);
    (config.base_shipping_cost as f64 * multiplier).round() as u64
}

pub fn estimate_delivery(config: &DeliveryConfig, today: NaiveDate, region: Option<&str>) -> NaiveDate {
    let days = lookup(&config.region_days, region, config.default_region_days).max(0) as u64;
    today.checked_add_days(Days::new(days)).unwrap_or(today)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_multipliers() {
        let cfg = DeliveryConfig::default();
        assert_eq!(shipping_cost(&cfg, 9000, Some("Santiago")), 3500);
        assert_eq!(shipping_cost(&cfg, 9000, Some("Valparaíso")), 4550);
        assert_eq!(shipping_cost(&cfg, 9000, Some("Biobío")), 5250);
        assert_eq!(shipping_cost(&cfg, 9000, Some("Aysén")), 7000);
        assert_eq!(shipping_cost(&cfg, 9000, None), 7000);
    }

    #[test]
    fn free_shipping_at_threshold() {
        let cfg = DeliveryConfig::default();
        assert_eq!(shipping_cost(&cfg, 15_000, Some("Aysén")), 0);
        assert_eq!(shipping_cost(&cfg, 14_999, Some("Santiago")), 3500);
    }

    #[test]
    fn delivery_dates_by_region() {
        let cfg = DeliveryConfig::default();
        let today = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();
        assert_eq!(estimate_delivery(&cfg, today, Some("Metropolitana")), NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert_eq!(estimate_delivery(&cfg, today, Some("Biobío")), NaiveDate::from_ymd_opt(2025, 2, 3).unwrap());
        assert_eq!(estimate_delivery(&cfg, today, Some("Magallanes")), NaiveDate::from_ymd_opt(2025, 2, 6).unwrap());
    }
}
