// File: clawbot-common/src/models/admission.rs

use serde::{Deserialize, Serialize};

use super::queue::{EnqueueReceipt, QueueRejection};

/// A paid request to join the play queue, normalized from a platform event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    pub user_id: String,
    pub username: String,
    pub base_priority: i64,
    /// Channel-point cost of the reward that was redeemed.
    pub cost: u64,
    #[serde(default)]
    pub input: String,
    pub redemption_id: String,
    #[serde(default)]
    pub reward_title: String,
}

impl AdmissionRequest {
    /// Metadata stored on the queue entry.
    pub fn metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("source".into(), "channel_points".into());
        map.insert("cost".into(), self.cost.into());
        map.insert("input".into(), self.input.clone().into());
        map.insert("redemption_id".into(), self.redemption_id.clone().into());
        map.insert("reward_title".into(), self.reward_title.clone().into());
        map
    }
}

/// Everything the ingestion layer can hand to the game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Admission {
    Play(AdmissionRequest),
    /// Bits buy bonus plays for a queued/active user, or a boosted admission.
    Bits {
        user_id: String,
        username: String,
        bits: u64,
        #[serde(default)]
        message: String,
    },
    /// Marks the user as a subscriber for future admissions.
    Subscription {
        user_id: String,
        username: String,
        tier: String,
        cumulative_months: u32,
    },
}

impl Admission {
    pub fn user_id(&self) -> &str {
        match self {
            Admission::Play(req) => &req.user_id,
            Admission::Bits { user_id, .. } | Admission::Subscription { user_id, .. } => user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Admission::Play(_) => "play",
            Admission::Bits { .. } => "bits",
            Admission::Subscription { .. } => "subscription",
        }
    }
}

/// How the game reacted to an admission. Every variant has a chat-friendly message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdmissionOutcome {
    Queued { receipt: EnqueueReceipt },
    Rejected { rejection: QueueRejection },
    PlaysAdded { plays: u32, plays_remaining: u32 },
    /// Cheer too small to buy a play; only recorded in the player's stats.
    BitsRecorded { bits: u64 },
    SubscriberFlagged,
}

impl AdmissionOutcome {
    pub fn message(&self) -> String {
        match self {
            AdmissionOutcome::Queued { receipt } => format!(
                "You're in line at position {}! Estimated wait: {}s.",
                receipt.position,
                receipt.estimated_wait_ms / 1000
            ),
            AdmissionOutcome::Rejected { rejection } => rejection.message().to_string(),
            AdmissionOutcome::PlaysAdded { plays, plays_remaining } => format!(
                "Thanks for the bits! +{} play(s), you now have {}.",
                plays, plays_remaining
            ),
            AdmissionOutcome::BitsRecorded { bits } => {
                format!("Thanks for the {} bits! Cheer a bit more to earn a bonus play.", bits)
            }
            AdmissionOutcome::SubscriberFlagged => {
                "Thanks for subscribing! You'll get priority in the line from now on.".to_string()
            }
        }
    }
}
