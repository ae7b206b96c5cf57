//! src/eventbus/mod.rs
//!
//! In-process event bus with guaranteed delivery to every subscriber via
//! bounded MPSC queues.

pub mod redemption_logger;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch, Mutex};

use clawbot_common::models::{Admission, CleanupReport, Redemption, Session};

/// Everything the game publishes or reacts to.
#[derive(Debug, Clone)]
pub enum ClawEvent {
    /// A verified, deduplicated webhook turned into an admission.
    Admission {
        message_id: String,
        admission: Admission,
        received_at: DateTime<Utc>,
    },
    SessionStarted(Session),
    SessionEnded(Session),
    PrizeRedeemed(Redemption),
    QueueSwept(CleanupReport),
}

impl ClawEvent {
    pub fn event_type(&self) -> String {
        match self {
            ClawEvent::Admission { admission, .. } => format!("admission.{}", admission.kind()),
            ClawEvent::SessionStarted(_) => "session.started".to_string(),
            ClawEvent::SessionEnded(_) => "session.ended".to_string(),
            ClawEvent::PrizeRedeemed(_) => "prize.redeemed".to_string(),
            ClawEvent::QueueSwept(_) => "queue.swept".to_string(),
        }
    }
}

/// Each subscriber gets its own `mpsc::Sender<ClawEvent>`.
///
/// - If a subscriber's buffer fills, `publish` waits for space (backpressure).
/// - If a subscriber dropped its `Receiver`, sends to it fail and are skipped.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<ClawEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

const DEFAULT_BUFFER_SIZE: usize = 10000;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<ClawEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an event to all live subscribers. Closed subscribers are pruned.
    pub async fn publish(&self, event: ClawEvent) {
        let senders = {
            let mut subs = self.subscribers.lock().await;
            subs.retain(|s| !s.is_closed());
            subs.clone()
        };
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}
