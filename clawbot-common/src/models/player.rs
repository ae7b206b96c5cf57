// File: clawbot-common/src/models/player.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime statistics for one viewer. Updated by the queue on every
/// session transition and read by the prize allocator for win odds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub user_id: String,
    pub username: String,
    pub total_plays: u32,
    pub wins: u32,
    pub bits_spent: u64,
    pub is_subscriber: bool,
    pub is_vip: bool,
    pub is_moderator: bool,
    pub first_play_at: Option<DateTime<Utc>>,
    pub last_play_at: Option<DateTime<Utc>>,
    pub last_win_at: Option<DateTime<Utc>>,
}

impl PlayerStats {
    pub fn new(user_id: &str, username: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            total_plays: 0,
            wins: 0,
            bits_spent: 0,
            is_subscriber: false,
            is_vip: false,
            is_moderator: false,
            first_play_at: None,
            last_play_at: None,
            last_win_at: None,
        }
    }

    /// Plays that did not end in a win.
    pub fn loss_streak(&self) -> u32 {
        self.total_plays.saturating_sub(self.wins)
    }

    /// Win rate as a percentage (0.0 when the player never played).
    pub fn win_rate(&self) -> f64 {
        if self.total_plays == 0 {
            0.0
        } else {
            f64::from(self.wins) / f64::from(self.total_plays) * 100.0
        }
    }
}

/// Partial update of a player's role flags. `None` leaves the flag untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerFlags {
    #[serde(default)]
    pub subscriber: Option<bool>,
    #[serde(default)]
    pub vip: Option<bool>,
    #[serde(default)]
    pub moderator: Option<bool>,
}

impl PlayerFlags {
    pub fn subscriber() -> Self {
        Self { subscriber: Some(true), ..Self::default() }
    }

    pub fn apply(&self, stats: &mut PlayerStats) {
        if let Some(v) = self.subscriber {
            stats.is_subscriber = v;
        }
        if let Some(v) = self.vip {
            stats.is_vip = v;
        }
        if let Some(v) = self.moderator {
            stats.is_moderator = v;
        }
    }
}
