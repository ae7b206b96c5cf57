// File: clawbot-common/src/models/queue.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A viewer waiting for a turn at the machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub user_id: String,
    pub username: String,
    /// Computed once at enqueue time; never re-ranked while waiting.
    pub priority: i64,
    pub joined_at: DateTime<Utc>,
    pub plays_remaining: u32,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayRecord {
    pub at: DateTime<Utc>,
    pub plays_remaining: u32,
    pub won: bool,
}

/// A time-boxed grant of play attempts to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: String,
    pub username: String,
    pub start_time: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub plays_remaining: u32,
    pub status: SessionStatus,
    pub win_count: u32,
    pub play_history: Vec<PlayRecord>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Set while a play is being resolved so a second play cannot race it.
    #[serde(default)]
    pub play_in_progress: bool,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn time_remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.expires_at - now).max(chrono::Duration::zero())
    }
}

/// Returned by a successful enqueue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnqueueReceipt {
    /// 1-based position in the waiting line.
    pub position: usize,
    pub estimated_wait_ms: u64,
    pub priority: i64,
}

/// Expected, frequent reasons an admission is turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueRejection {
    AlreadyQueued,
    AlreadyPlaying,
    QueueFull,
}

impl QueueRejection {
    pub fn message(&self) -> &'static str {
        match self {
            QueueRejection::AlreadyQueued => "You're already in line! Hang tight, your turn is coming.",
            QueueRejection::AlreadyPlaying => "You're playing right now! Finish your turn before joining again.",
            QueueRejection::QueueFull => "The line is full right now. Please try again in a few minutes.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionError {
    NoSession,
    PlayInProgress,
}

impl SessionError {
    pub fn message(&self) -> &'static str {
        match self {
            SessionError::NoSession => "You don't have an active turn. Redeem a play to join the line!",
            SessionError::PlayInProgress => "Hold on, the claw is still moving!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayReceipt {
    pub plays_remaining: u32,
    /// True when this play finished the session.
    pub completed: bool,
}

/// What one cleanup sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub expired_sessions: usize,
    pub evicted_entries: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.expired_sessions + self.evicted_entries
    }
}

/// Lightweight read-only snapshot for overlays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub waiting: usize,
    pub playing: usize,
    pub max_concurrent: usize,
    pub estimated_next_player: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedPlayerView {
    pub username: String,
    pub position: usize,
    pub priority: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveSessionView {
    pub username: String,
    pub plays_remaining: u32,
    pub time_remaining_ms: u64,
    pub win_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_players: u64,
    pub total_plays: u64,
    pub total_wins: u64,
    pub avg_wait_ms: u64,
    pub queue_length: usize,
    /// Percentage of plays that won.
    pub win_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub wins: u32,
    pub total_plays: u32,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueDashboard {
    pub waiting: usize,
    pub players: Vec<QueuedPlayerView>,
    pub active_sessions: Vec<ActiveSessionView>,
    pub stats: QueueStats,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub timestamp: DateTime<Utc>,
}
