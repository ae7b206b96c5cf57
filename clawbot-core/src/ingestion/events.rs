// File: clawbot-core/src/ingestion/events.rs
//
// Payload shapes for the EventSub notifications the game listens to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CHANNEL_POINTS_REDEMPTION_ADD: &str = "channel.channel_points_custom_reward_redemption.add";
pub const CHANNEL_CHEER: &str = "channel.cheer";
pub const CHANNEL_SUBSCRIPTION_MESSAGE: &str = "channel.subscription.message";

pub const MESSAGE_TYPE_NOTIFICATION: &str = "notification";
pub const MESSAGE_TYPE_VERIFICATION: &str = "webhook_callback_verification";
pub const MESSAGE_TYPE_REVOCATION: &str = "revocation";

/// Subscription metadata carried by every webhook body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubscriptionData {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub sub_type: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub condition: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// `{ "subscription": {...}, "event": {...} }`, or a `challenge` during
/// callback verification.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub subscription: SubscriptionData,
    #[serde(default)]
    pub event: Option<serde_json::Value>,
    #[serde(default)]
    pub challenge: Option<String>,
}

// ------------------------------------------------------------------------
// "channel.channel_points_custom_reward_redemption.add" event
// ------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelPointsCustomRewardRedemption {
    pub id: String,
    #[serde(default)]
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub broadcaster_user_login: String,
    #[serde(default)]
    pub broadcaster_user_name: String,
    pub user_id: String,
    #[serde(default)]
    pub user_login: String,
    pub user_name: String,
    #[serde(default)]
    pub user_input: String,
    #[serde(default)]
    pub status: String,
    pub reward: RedemptionReward,
    #[serde(default)]
    pub redeemed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedemptionReward {
    pub id: String,
    pub title: String,
    pub cost: u64,
    #[serde(default)]
    pub prompt: String,
}

// ------------------------------------------------------------------------
// "channel.cheer" event
// ------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelCheer {
    #[serde(default)]
    pub is_anonymous: bool,
    pub user_id: Option<String>,
    pub user_login: Option<String>,
    pub user_name: Option<String>,
    #[serde(default)]
    pub broadcaster_user_id: String,
    #[serde(default)]
    pub message: String,
    pub bits: u64,
}

// ------------------------------------------------------------------------
// "channel.subscription.message" event
// ------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSubscriptionMessage {
    pub user_id: String,
    #[serde(default)]
    pub user_login: String,
    pub user_name: String,
    #[serde(default)]
    pub broadcaster_user_id: String,
    pub tier: String,
    #[serde(default)]
    pub message: Option<SubMessage>,
    #[serde(default)]
    pub cumulative_months: u32,
    #[serde(default)]
    pub streak_months: Option<u32>,
    #[serde(default)]
    pub duration_months: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubMessage {
    pub text: String,
}
