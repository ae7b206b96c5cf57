// File: clawbot-core/src/queue/manager.rs
//
// Priority queue of waiting viewers plus the table of active sessions.
// Everything lives behind one mutex; nothing here awaits.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use clawbot_common::models::{
    ActiveSessionView, AdmissionOutcome, CleanupReport, EnqueueReceipt, LeaderboardEntry,
    PlayReceipt, PlayRecord, PlayerFlags, PlayerStats, QueueDashboard, QueueEntry,
    QueueRejection, QueueStats, QueueStatus, QueuedPlayerView, Session, SessionError,
    SessionStatus,
};
use clawbot_common::traits::Clock;

use crate::config::QueueConfig;
use crate::utils::time::millis_between;

const LEADERBOARD_SIZE: usize = 10;

#[derive(Debug, Default)]
struct QueueCounters {
    total_players: u64,
    total_plays: u64,
    total_wins: u64,
    total_wait_ms: u64,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<QueueEntry>,
    active: HashMap<String, Session>,
    history: VecDeque<Session>,
    players: HashMap<String, PlayerStats>,
    counters: QueueCounters,
}

impl QueueState {
    fn player_mut(&mut self, user_id: &str, username: &str) -> &mut PlayerStats {
        let stats = self
            .players
            .entry(user_id.to_string())
            .or_insert_with(|| PlayerStats::new(user_id, username));
        if !username.is_empty() {
            stats.username = username.to_string();
        }
        stats
    }

    fn is_waiting(&self, user_id: &str) -> bool {
        self.queue.iter().any(|e| e.user_id == user_id)
    }

    fn push_history(&mut self, session: Session, limit: usize) {
        self.history.push_back(session);
        while self.history.len() > limit {
            self.history.pop_front();
        }
    }
}

/// Queue priority for a new admission.
///
/// Players with no stats, or who have not played for more than
/// `rarity_days`, get the rarity bonus.
pub fn compute_priority(
    config: &QueueConfig,
    stats: Option<&PlayerStats>,
    base_priority: i64,
    now: DateTime<Utc>,
) -> i64 {
    let mut priority = base_priority;
    let Some(stats) = stats else {
        return priority + config.rarity_bonus;
    };

    if stats.is_subscriber {
        priority += config.subscriber_bonus;
    }
    if stats.is_vip {
        priority += config.vip_bonus;
    }
    if stats.is_moderator {
        priority += config.moderator_bonus;
    }
    if stats.loss_streak() > config.loss_streak_threshold {
        priority += config.loss_streak_bonus;
    }
    let absent = match stats.last_play_at {
        None => true,
        Some(last) => now.signed_duration_since(last) > config.rarity_window(),
    };
    if absent {
        priority += config.rarity_bonus;
    }
    priority
}

pub struct QueueManager {
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<QueueState>,
}

impl QueueManager {
    pub fn new(config: QueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock, state: Mutex::new(QueueState::default()) }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Adds a viewer to the waiting line.
    ///
    /// The entry goes in front of the first entry with a strictly lower
    /// priority, so equal priorities keep arrival order. `metadata.plays`
    /// overrides the per-session play count.
    pub fn enqueue(
        &self,
        user_id: &str,
        username: &str,
        base_priority: i64,
        metadata: Map<String, Value>,
    ) -> Result<EnqueueReceipt, QueueRejection> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.enqueue_locked(&mut state, user_id, username, base_priority, metadata, now)
    }

    fn enqueue_locked(
        &self,
        state: &mut QueueState,
        user_id: &str,
        username: &str,
        base_priority: i64,
        metadata: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<EnqueueReceipt, QueueRejection> {
        if state.active.contains_key(user_id) {
            return Err(QueueRejection::AlreadyPlaying);
        }
        if state.is_waiting(user_id) {
            return Err(QueueRejection::AlreadyQueued);
        }
        if self.config.max_queue_length > 0 && state.queue.len() >= self.config.max_queue_length {
            return Err(QueueRejection::QueueFull);
        }

        let priority = compute_priority(&self.config, state.players.get(user_id), base_priority, now);
        state.player_mut(user_id, username);

        let plays_remaining = metadata
            .get("plays")
            .and_then(Value::as_u64)
            .filter(|p| *p > 0)
            .map(|p| p.min(u64::from(u32::MAX)) as u32)
            .unwrap_or(self.config.max_plays_per_session);

        let idx = state
            .queue
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(state.queue.len());
        state.queue.insert(
            idx,
            QueueEntry {
                user_id: user_id.to_string(),
                username: username.to_string(),
                priority,
                joined_at: now,
                plays_remaining,
                metadata,
            },
        );

        let free_slots = self.config.max_concurrent_players.saturating_sub(state.active.len());
        let estimated_wait_ms = idx.saturating_sub(free_slots) as u64 * self.config.session_duration_ms;

        info!(
            "[Queue] {} joined at position {} (priority {}, {} play(s))",
            username,
            idx + 1,
            priority,
            plays_remaining
        );
        Ok(EnqueueReceipt { position: idx + 1, estimated_wait_ms, priority })
    }

    /// Starts a session for the head of the line. Returns `None` when the
    /// line is empty or every slot is taken.
    pub fn dequeue(&self) -> Option<Session> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.dequeue_locked(&mut state, now)
    }

    fn dequeue_locked(&self, state: &mut QueueState, now: DateTime<Utc>) -> Option<Session> {
        if state.active.len() >= self.config.max_concurrent_players {
            return None;
        }
        let entry = state.queue.pop_front()?;

        let session = Session {
            session_id: Uuid::new_v4(),
            user_id: entry.user_id.clone(),
            username: entry.username.clone(),
            start_time: now,
            expires_at: now
                .checked_add_signed(self.config.session_duration())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            plays_remaining: entry.plays_remaining,
            status: SessionStatus::Active,
            win_count: 0,
            play_history: Vec::new(),
            metadata: entry.metadata,
            ended_at: None,
            play_in_progress: false,
        };
        state.active.insert(entry.user_id.clone(), session.clone());

        state.counters.total_players += 1;
        state.counters.total_wait_ms += millis_between(entry.joined_at, now);
        let stats = state.player_mut(&entry.user_id, &entry.username);
        stats.first_play_at.get_or_insert(now);
        stats.last_play_at = Some(now);

        info!("[Queue] {} is up! Session {} started", session.username, session.session_id);
        Some(session)
    }

    /// Fills every free slot from the head of the line.
    pub fn promote_ready(&self) -> Vec<Session> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let mut started = Vec::new();
        while let Some(session) = self.dequeue_locked(&mut state, now) {
            started.push(session);
        }
        started
    }

    /// Expires timed-out sessions and evicts entries that waited too long.
    /// A session whose play is still resolving is left for the next sweep.
    pub fn cleanup(&self) -> CleanupReport {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let mut report = CleanupReport::default();

        let expired: Vec<String> = state
            .active
            .values()
            .filter(|s| s.expires_at <= now && !s.play_in_progress)
            .map(|s| s.user_id.clone())
            .collect();
        for user_id in expired {
            if let Some(mut session) = state.active.remove(&user_id) {
                session.status = SessionStatus::Expired;
                session.ended_at = Some(now);
                debug!("[Queue] Session {} for {} expired", session.session_id, session.username);
                state.push_history(session, self.config.history_limit);
                report.expired_sessions += 1;
            }
        }

        let timeout = self.config.queue_timeout();
        let before = state.queue.len();
        state.queue.retain(|e| now - e.joined_at <= timeout);
        report.evicted_entries = before - state.queue.len();

        if report.total() > 0 {
            info!(
                "[Queue] Cleanup: {} session(s) expired, {} entr(y/ies) evicted",
                report.expired_sessions, report.evicted_entries
            );
        }
        report
    }

    /// Consumes one play without resolving a prize. `won` is kept in the
    /// play history; wins are counted by [`QueueManager::record_win`].
    pub fn use_play(&self, user_id: &str, won: bool) -> Result<PlayReceipt, SessionError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        match state.active.get(user_id) {
            None => return Err(SessionError::NoSession),
            Some(s) if s.play_in_progress => return Err(SessionError::PlayInProgress),
            Some(_) => {}
        }
        Ok(self.resolve_play_locked(&mut state, user_id, won, false, now))
    }

    /// Marks a play as started and returns the player's stats for the odds.
    pub fn begin_play(&self, user_id: &str) -> Result<PlayerStats, SessionError> {
        let mut state = self.state.lock();
        let session = state.active.get_mut(user_id).ok_or(SessionError::NoSession)?;
        if session.play_in_progress {
            return Err(SessionError::PlayInProgress);
        }
        if session.plays_remaining == 0 {
            return Err(SessionError::NoSession);
        }
        session.play_in_progress = true;
        let username = session.username.clone();
        Ok(state.player_mut(user_id, &username).clone())
    }

    /// Settles a play opened with [`QueueManager::begin_play`], counting the
    /// win if there was one.
    pub fn finish_play(&self, user_id: &str, won: bool) -> Result<PlayReceipt, SessionError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if !state.active.contains_key(user_id) {
            return Err(SessionError::NoSession);
        }
        Ok(self.resolve_play_locked(&mut state, user_id, won, won, now))
    }

    fn resolve_play_locked(
        &self,
        state: &mut QueueState,
        user_id: &str,
        won: bool,
        count_win: bool,
        now: DateTime<Utc>,
    ) -> PlayReceipt {
        let Some(session) = state.active.get_mut(user_id) else {
            return PlayReceipt { plays_remaining: 0, completed: true };
        };
        session.play_in_progress = false;
        session.plays_remaining = session.plays_remaining.saturating_sub(1);
        session.play_history.push(PlayRecord { at: now, plays_remaining: session.plays_remaining, won });
        if count_win {
            session.win_count += 1;
        }
        let plays_remaining = session.plays_remaining;
        let completed = plays_remaining == 0 || (count_win && self.config.end_session_on_win);
        let username = session.username.clone();

        state.counters.total_plays += 1;
        if count_win {
            state.counters.total_wins += 1;
        }
        let stats = state.player_mut(user_id, &username);
        stats.total_plays += 1;
        if count_win {
            stats.wins += 1;
            stats.last_win_at = Some(now);
        }

        if completed {
            self.complete_locked(state, user_id, now);
        }
        PlayReceipt { plays_remaining, completed }
    }

    fn complete_locked(&self, state: &mut QueueState, user_id: &str, now: DateTime<Utc>) {
        if let Some(mut session) = state.active.remove(user_id) {
            session.status = SessionStatus::Completed;
            session.ended_at = Some(now);
            info!(
                "[Queue] {} finished with {} win(s)",
                session.username, session.win_count
            );
            state.push_history(session, self.config.history_limit);
        }
    }

    /// Counts a win on the active session. Returns the session's win total.
    pub fn record_win(&self, user_id: &str, prize_id: &str) -> Result<u32, SessionError> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let session = state.active.get_mut(user_id).ok_or(SessionError::NoSession)?;
        session.win_count += 1;
        let win_count = session.win_count;
        let username = session.username.clone();
        match session.metadata.get_mut("prizes").and_then(Value::as_array_mut) {
            Some(list) => list.push(prize_id.into()),
            None => {
                session.metadata.insert("prizes".into(), Value::Array(vec![prize_id.into()]));
            }
        }
        let finished = session.plays_remaining == 0 || self.config.end_session_on_win;

        state.counters.total_wins += 1;
        let stats = state.player_mut(user_id, &username);
        stats.wins += 1;
        stats.last_win_at = Some(now);

        if finished {
            self.complete_locked(&mut state, user_id, now);
        }
        Ok(win_count)
    }

    /// Bonus plays for a user who is waiting or playing. Priority is left
    /// alone. Returns the new play count, or `None` if the user is neither.
    pub fn add_plays(&self, user_id: &str, plays: u32) -> Option<u32> {
        let mut state = self.state.lock();
        Self::add_plays_locked(&mut state, user_id, plays)
    }

    fn add_plays_locked(state: &mut QueueState, user_id: &str, plays: u32) -> Option<u32> {
        if let Some(session) = state.active.get_mut(user_id) {
            session.plays_remaining = session.plays_remaining.saturating_add(plays);
            return Some(session.plays_remaining);
        }
        state
            .queue
            .iter_mut()
            .find(|e| e.user_id == user_id)
            .map(|e| {
                e.plays_remaining = e.plays_remaining.saturating_add(plays);
                e.plays_remaining
            })
    }

    /// Adds to the player's lifetime bits total.
    pub fn record_bits(&self, user_id: &str, username: &str, bits: u64) -> u64 {
        let mut state = self.state.lock();
        let stats = state.player_mut(user_id, username);
        stats.bits_spent = stats.bits_spent.saturating_add(bits);
        stats.bits_spent
    }

    /// A cheer: records the bits, then buys plays with them. A user already
    /// waiting or playing gets the plays added; anyone else is admitted with
    /// the bits as base priority. Runs under a single lock.
    pub fn apply_bits(&self, user_id: &str, username: &str, bits: u64) -> AdmissionOutcome {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let stats = state.player_mut(user_id, username);
        stats.bits_spent = stats.bits_spent.saturating_add(bits);

        let plays = (bits / self.config.bits_per_play.max(1)).min(u64::from(u32::MAX)) as u32;
        if plays == 0 {
            return AdmissionOutcome::BitsRecorded { bits };
        }
        if let Some(plays_remaining) = Self::add_plays_locked(&mut state, user_id, plays) {
            info!("[Queue] {} cheered {} bits => +{} play(s)", username, bits, plays);
            return AdmissionOutcome::PlaysAdded { plays, plays_remaining };
        }

        let mut metadata = Map::new();
        metadata.insert("source".into(), "bits".into());
        metadata.insert("bits".into(), bits.into());
        metadata.insert("plays".into(), plays.into());
        let base = i64::try_from(bits)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.config.bits_priority_multiplier);
        match self.enqueue_locked(&mut state, user_id, username, base, metadata, now) {
            Ok(receipt) => AdmissionOutcome::Queued { receipt },
            Err(rejection) => AdmissionOutcome::Rejected { rejection },
        }
    }

    /// Updates role flags. Only admissions made afterwards see the change.
    pub fn set_player_flags(&self, user_id: &str, username: &str, flags: PlayerFlags) -> PlayerStats {
        let mut state = self.state.lock();
        let stats = state.player_mut(user_id, username);
        flags.apply(stats);
        stats.clone()
    }

    /// Leaves the line. Returns whether the user was waiting.
    pub fn remove(&self, user_id: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.queue.len();
        state.queue.retain(|e| e.user_id != user_id);
        before != state.queue.len()
    }

    pub fn status(&self) -> QueueStatus {
        let now = self.clock.now();
        let state = self.state.lock();
        QueueStatus {
            waiting: state.queue.len(),
            playing: state.active.len(),
            max_concurrent: self.config.max_concurrent_players,
            estimated_next_player: state.queue.front().map(|e| e.username.clone()),
            timestamp: now,
        }
    }

    pub fn dashboard(&self) -> QueueDashboard {
        let now = self.clock.now();
        let state = self.state.lock();

        let players = state
            .queue
            .iter()
            .enumerate()
            .map(|(i, e)| QueuedPlayerView { username: e.username.clone(), position: i + 1, priority: e.priority })
            .collect();

        let mut active_sessions: Vec<ActiveSessionView> = state
            .active
            .values()
            .map(|s| ActiveSessionView {
                username: s.username.clone(),
                plays_remaining: s.plays_remaining,
                time_remaining_ms: s.time_remaining(now).num_milliseconds().max(0) as u64,
                win_count: s.win_count,
            })
            .collect();
        active_sessions.sort_by_key(|v| v.time_remaining_ms);

        let c = &state.counters;
        let stats = QueueStats {
            total_players: c.total_players,
            total_plays: c.total_plays,
            total_wins: c.total_wins,
            avg_wait_ms: c.total_wait_ms.checked_div(c.total_players).unwrap_or(0),
            queue_length: state.queue.len(),
            win_rate: if c.total_plays == 0 {
                0.0
            } else {
                c.total_wins as f64 / c.total_plays as f64 * 100.0
            },
        };

        let mut ranked: Vec<&PlayerStats> = state.players.values().filter(|p| p.total_plays > 0 || p.wins > 0).collect();
        ranked.sort_by(|a, b| {
            b.wins
                .cmp(&a.wins)
                .then_with(|| a.total_plays.cmp(&b.total_plays))
                .then_with(|| a.username.cmp(&b.username))
        });
        let leaderboard = ranked
            .into_iter()
            .take(LEADERBOARD_SIZE)
            .map(|p| LeaderboardEntry {
                user_id: p.user_id.clone(),
                username: p.username.clone(),
                wins: p.wins,
                total_plays: p.total_plays,
                win_rate: p.win_rate(),
            })
            .collect();

        QueueDashboard {
            waiting: state.queue.len(),
            players,
            active_sessions,
            stats,
            leaderboard,
            timestamp: now,
        }
    }

    pub fn player_stats(&self, user_id: &str) -> Option<PlayerStats> {
        self.state.lock().players.get(user_id).cloned()
    }

    pub fn session(&self, user_id: &str) -> Option<Session> {
        self.state.lock().active.get(user_id).cloned()
    }

    pub fn is_waiting(&self, user_id: &str) -> bool {
        self.state.lock().is_waiting(user_id)
    }

    pub fn waiting_entries(&self) -> Vec<QueueEntry> {
        self.state.lock().queue.iter().cloned().collect()
    }

    /// Most recent finished sessions, oldest first.
    pub fn history_tail(&self, n: usize) -> Vec<Session> {
        let state = self.state.lock();
        let skip = state.history.len().saturating_sub(n);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// The user's most recently finished session, if still in history.
    pub fn last_finished(&self, user_id: &str) -> Option<Session> {
        self.state.lock().history.iter().rev().find(|s| s.user_id == user_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }
}
