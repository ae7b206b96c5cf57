//! Runtime configuration, injected at construction.
//!
//! Every component takes its own section by value; there is no process-wide
//! config object. The server builds a [`ClawConfig`] from an optional JSON
//! file, then overrides individual fields from CLI flags and the environment.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;

const DAY_MS: u64 = 86_400_000;
/// Upper bound for any day-denominated setting.
pub const MAX_DAYS: i64 = 3_650;

/// Saturates instead of overflowing `chrono`'s range.
fn millis(ms: u64) -> chrono::Duration {
    i64::try_from(ms)
        .ok()
        .and_then(chrono::Duration::try_milliseconds)
        .unwrap_or(chrono::Duration::MAX)
}

fn days(n: i64) -> chrono::Duration {
    chrono::Duration::try_days(n).unwrap_or(if n < 0 { chrono::Duration::MIN } else { chrono::Duration::MAX })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClawConfig {
    pub queue: QueueConfig,
    pub prizes: PrizeConfig,
    pub delivery: DeliveryConfig,
    pub webhook: WebhookConfig,
    pub api: ApiConfig,
    pub tasks: TaskConfig,
}

impl ClawConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        let cfg: ClawConfig = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.queue.max_concurrent_players == 0 {
            return Err(Error::Config("queue.max_concurrent_players must be at least 1".into()));
        }
        if !(1..=DAY_MS).contains(&self.queue.session_duration_ms) {
            return Err(Error::Config("queue.session_duration_ms must be within (0, 24h]".into()));
        }
        if self.queue.queue_timeout_ms > 7 * DAY_MS {
            return Err(Error::Config("queue.queue_timeout_ms must be at most 7 days".into()));
        }
        if !(0..=MAX_DAYS).contains(&self.queue.rarity_days) {
            return Err(Error::Config(format!("queue.rarity_days must be within [0, {}]", MAX_DAYS)));
        }
        if !(1..=MAX_DAYS).contains(&self.delivery.link_ttl_days) {
            return Err(Error::Config(format!("delivery.link_ttl_days must be within [1, {}]", MAX_DAYS)));
        }
        if self.webhook.dedup_window_ms > DAY_MS {
            return Err(Error::Config("webhook.dedup_window_ms must be at most 24h".into()));
        }
        if !(0.0..=1.0).contains(&self.prizes.base_win_rate) {
            return Err(Error::Config("prizes.base_win_rate must be within [0, 1]".into()));
        }
        if self.delivery.delivery_attempts == 0 {
            return Err(Error::Config("delivery.delivery_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_concurrent_players: usize,
    pub session_duration_ms: u64,
    pub max_plays_per_session: u32,
    pub queue_timeout_ms: u64,
    /// 0 disables the limit.
    pub max_queue_length: usize,
    /// Completed/expired sessions kept for the dashboard.
    pub history_limit: usize,
    pub end_session_on_win: bool,
    pub subscriber_bonus: i64,
    pub vip_bonus: i64,
    pub moderator_bonus: i64,
    pub loss_streak_bonus: i64,
    pub loss_streak_threshold: u32,
    pub rarity_bonus: i64,
    pub rarity_days: i64,
    /// Bits needed for one bonus play.
    pub bits_per_play: u64,
    /// Queue priority earned per bit when a cheer admits a new player.
    pub bits_priority_multiplier: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_players: 3,
            session_duration_ms: 60_000,
            max_plays_per_session: 1,
            queue_timeout_ms: 300_000,
            max_queue_length: 0,
            history_limit: 1_000,
            end_session_on_win: false,
            subscriber_bonus: 100,
            vip_bonus: 50,
            moderator_bonus: 10,
            loss_streak_bonus: 10,
            loss_streak_threshold: 5,
            rarity_bonus: 20,
            rarity_days: 7,
            bits_per_play: 100,
            bits_priority_multiplier: 1,
        }
    }
}

impl QueueConfig {
    pub fn session_duration(&self) -> chrono::Duration {
        millis(self.session_duration_ms)
    }

    pub fn queue_timeout(&self) -> chrono::Duration {
        millis(self.queue_timeout_ms)
    }

    /// Absence after which a returning player earns the rarity bonus.
    pub fn rarity_window(&self) -> chrono::Duration {
        days(self.rarity_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrizeConfig {
    pub base_win_rate: f64,
    /// Losses above which the streak adjustment applies.
    pub loss_streak_threshold: u32,
    pub loss_streak_step: f64,
    pub loss_streak_cap: f64,
    pub subscriber_bonus: f64,
    pub vip_bonus: f64,
    pub max_daily_prizes: u32,
    pub low_stock_digital: u32,
    pub low_stock_physical: u32,
    pub history_tail: usize,
    /// Seeds the prize RNG; only meant for reproducible demos and tests.
    pub seed: Option<u64>,
}

impl Default for PrizeConfig {
    fn default() -> Self {
        Self {
            base_win_rate: 0.15,
            loss_streak_threshold: 3,
            loss_streak_step: 0.05,
            loss_streak_cap: 0.40,
            subscriber_bonus: 0.05,
            vip_bonus: 0.03,
            max_daily_prizes: 50,
            low_stock_digital: 10,
            low_stock_physical: 5,
            history_tail: 10,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Prizes worth at least this much ship for free.
    pub free_shipping_threshold: u64,
    pub base_shipping_cost: u64,
    pub region_multipliers: HashMap<String, f64>,
    pub default_region_multiplier: f64,
    pub region_days: HashMap<String, i64>,
    pub default_region_days: i64,
    pub default_carrier: String,
    pub provider_timeout_ms: u64,
    pub delivery_attempts: u32,
    pub retry_backoff_ms: u64,
    pub link_ttl_days: i64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let region_multipliers = [
            ("Santiago", 1.0),
            ("Metropolitana", 1.0),
            ("Valparaíso", 1.3),
            ("Biobío", 1.5),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let region_days = [
            ("Santiago", 2),
            ("Metropolitana", 2),
            ("Valparaíso", 3),
            ("Biobío", 4),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self {
            free_shipping_threshold: 15_000,
            base_shipping_cost: 3_500,
            region_multipliers,
            default_region_multiplier: 2.0,
            region_days,
            default_region_days: 7,
            default_carrier: "chilexpress".to_string(),
            provider_timeout_ms: 5_000,
            delivery_attempts: 3,
            retry_backoff_ms: 250,
            link_ttl_days: 7,
        }
    }
}

impl DeliveryConfig {
    pub fn provider_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn link_ttl(&self) -> chrono::Duration {
        days(self.link_ttl_days)
    }
}

/// What the HMAC is computed over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScheme {
    /// HMAC-SHA256 of the raw request body.
    #[default]
    RawBody,
    /// HMAC-SHA256 of `message_id || timestamp || body` (Twitch EventSub).
    TwitchEventSub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Never read from the config file in production; the server fills it
    /// from the environment.
    #[serde(skip_serializing)]
    pub secret: String,
    pub scheme: SignatureScheme,
    pub dedup_window_ms: u64,
    pub dedup_max_entries: usize,
    pub request_timeout_ms: u64,
}

impl WebhookConfig {
    pub fn dedup_window(&self) -> chrono::Duration {
        millis(self.dedup_window_ms)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            scheme: SignatureScheme::RawBody,
            dedup_window_ms: 600_000,
            dedup_max_entries: 10_000,
            request_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer token the machine controller sends on `POST /play`. Empty
    /// disables the route. Filled from the environment like the webhook
    /// secret.
    #[serde(skip_serializing)]
    pub controller_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub cleanup_interval_ms: u64,
    pub scheduler_interval_ms: u64,
    pub logger_batch_size: usize,
    pub logger_flush_interval_ms: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_ms: 30_000,
            scheduler_interval_ms: 1_000,
            logger_batch_size: 32,
            logger_flush_interval_ms: 5_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: ClawConfig = serde_json::from_str(
            r#"{ "queue": { "max_concurrent_players": 1 }, "prizes": { "base_win_rate": 0.2 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.queue.max_concurrent_players, 1);
        assert_eq!(cfg.queue.session_duration_ms, 60_000);
        assert!((cfg.prizes.base_win_rate - 0.2).abs() < f64::EPSILON);
        assert_eq!(cfg.delivery.free_shipping_threshold, 15_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut cfg = ClawConfig::default();
        cfg.queue.max_concurrent_players = 0;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn out_of_range_durations_are_rejected() {
        let cases: [fn(&mut ClawConfig); 6] = [
            |c| c.queue.session_duration_ms = 1e17 as u64,
            |c| c.queue.session_duration_ms = DAY_MS + 1,
            |c| c.queue.queue_timeout_ms = u64::MAX,
            |c| c.queue.rarity_days = i64::MAX,
            |c| c.delivery.link_ttl_days = 0,
            |c| c.webhook.dedup_window_ms = u64::MAX,
        ];
        for (i, mutate) in cases.iter().enumerate() {
            let mut cfg = ClawConfig::default();
            mutate(&mut cfg);
            assert!(matches!(cfg.validate(), Err(Error::Config(_))), "case {}", i);
        }

        let mut edge = ClawConfig::default();
        edge.queue.session_duration_ms = DAY_MS;
        edge.queue.rarity_days = MAX_DAYS;
        edge.delivery.link_ttl_days = MAX_DAYS;
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn durations_saturate_past_chrono_range() {
        let queue = QueueConfig {
            session_duration_ms: u64::MAX,
            rarity_days: i64::MAX,
            ..QueueConfig::default()
        };
        assert_eq!(queue.session_duration(), chrono::Duration::MAX);
        assert_eq!(queue.rarity_window(), chrono::Duration::MAX);
        let delivery = DeliveryConfig { link_ttl_days: i64::MIN, ..DeliveryConfig::default() };
        assert_eq!(delivery.link_ttl(), chrono::Duration::MIN);
        assert_eq!(QueueConfig::default().session_duration(), chrono::Duration::seconds(60));
    }
}
