// File: clawbot-core/src/services/game_service.rs
//
// Ties the queue, the prize allocator and delivery together: routes
// admissions, starts sessions and resolves plays.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use clawbot_common::models::{
    Admission, AdmissionOutcome, CleanupReport, DeliveryInfo, PlayReceipt, PlayerFlags,
    PrizeOutcome, RedeemOutcome, Session, SessionError, WinDecision,
};

use crate::Error;
use crate::delivery::DeliveryDispatcher;
use crate::eventbus::{ClawEvent, EventBus};
use crate::prizes::PrizeAllocator;
use crate::queue::QueueManager;

/// Result of one play, as reported back to the machine controller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlayOutcome {
    Played {
        decision: WinDecision,
        prize: PrizeOutcome,
        redemption: Option<RedeemOutcome>,
        receipt: PlayReceipt,
        message: String,
    },
    Rejected {
        reason: SessionError,
        message: String,
    },
}

impl PlayOutcome {
    pub fn message(&self) -> &str {
        match self {
            PlayOutcome::Played { message, .. } | PlayOutcome::Rejected { message, .. } => message,
        }
    }

    pub fn won(&self) -> bool {
        matches!(
            self,
            PlayOutcome::Played { redemption: Some(RedeemOutcome::Redeemed { .. }), .. }
        )
    }
}

pub struct GameService {
    queue: Arc<QueueManager>,
    prizes: Arc<PrizeAllocator>,
    delivery: Arc<DeliveryDispatcher>,
    event_bus: Arc<EventBus>,
}

impl GameService {
    pub fn new(
        queue: Arc<QueueManager>,
        prizes: Arc<PrizeAllocator>,
        delivery: Arc<DeliveryDispatcher>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self { queue, prizes, delivery, event_bus }
    }

    pub fn queue(&self) -> &Arc<QueueManager> {
        &self.queue
    }

    pub fn prizes(&self) -> &Arc<PrizeAllocator> {
        &self.prizes
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Applies one admission to the queue.
    pub fn handle_admission(&self, admission: Admission) -> AdmissionOutcome {
        let user_id = admission.user_id().to_string();
        let kind = admission.kind();
        let outcome = match admission {
            Admission::Play(req) => {
                let metadata = req.metadata();
                match self.queue.enqueue(&req.user_id, &req.username, req.base_priority, metadata) {
                    Ok(receipt) => AdmissionOutcome::Queued { receipt },
                    Err(rejection) => AdmissionOutcome::Rejected { rejection },
                }
            }
            Admission::Bits { user_id, username, bits, .. } => {
                self.queue.apply_bits(&user_id, &username, bits)
            }
            Admission::Subscription { user_id, username, tier, cumulative_months } => {
                debug!("[Game] {} subscribed (tier {}, {} months)", username, tier, cumulative_months);
                self.queue.set_player_flags(&user_id, &username, PlayerFlags::subscriber());
                AdmissionOutcome::SubscriberFlagged
            }
        };
        info!("[Game] {} admission for '{}' => {}", kind, user_id, outcome.message());
        outcome
    }

    /// Starts sessions for every free slot and announces them.
    pub async fn promote_ready(&self) -> Vec<Session> {
        let started = self.queue.promote_ready();
        for session in &started {
            self.event_bus.publish(ClawEvent::SessionStarted(session.clone())).await;
        }
        started
    }

    /// Resolves one play for `user_id`: win roll, prize pick and, on a
    /// win, redemption and delivery.
    pub async fn play(&self, user_id: &str, info: Option<DeliveryInfo>) -> Result<PlayOutcome, Error> {
        let stats = match self.queue.begin_play(user_id) {
            Ok(stats) => stats,
            Err(reason) => {
                return Ok(PlayOutcome::Rejected { reason, message: reason.message().to_string() });
            }
        };

        let decision = self.prizes.determine_win(&stats);
        let prize = self.prizes.select_prize(&decision);
        debug!(
            "[Game] {} rolled {:.3} against {} => {:?}",
            stats.username,
            decision.roll,
            decision.win_chance_percent(),
            decision.did_win
        );

        let redemption = match &prize {
            PrizeOutcome::Win { prize: item, .. } => {
                let info = info.unwrap_or_default();
                match self
                    .prizes
                    .redeem(&item.id, user_id, &stats.username, &info, &self.delivery)
                    .await
                {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        self.abandon_play(user_id);
                        return Err(e);
                    }
                }
            }
            PrizeOutcome::Loss { .. } | PrizeOutcome::OutOfStock { .. } => None,
        };
        let won = matches!(redemption, Some(RedeemOutcome::Redeemed { .. }));

        let receipt = match self.queue.finish_play(user_id, won) {
            Ok(receipt) => receipt,
            Err(reason) => {
                warn!("[Game] Session for '{}' vanished mid-play: {:?}", user_id, reason);
                PlayReceipt { plays_remaining: 0, completed: true }
            }
        };

        if let Some(RedeemOutcome::Redeemed { redemption: r, .. }) = &redemption {
            self.event_bus.publish(ClawEvent::PrizeRedeemed(r.clone())).await;
        }
        if receipt.completed {
            if let Some(session) = self.queue.last_finished(user_id) {
                self.event_bus.publish(ClawEvent::SessionEnded(session)).await;
            }
        }

        let message = match &redemption {
            Some(RedeemOutcome::Redeemed { message, .. }) => format!("{} {}", prize.message(), message),
            Some(other) => other.message().to_string(),
            None => prize.message().to_string(),
        };
        Ok(PlayOutcome::Played { decision, prize, redemption, receipt, message })
    }

    /// Counts a play that could not be resolved as a loss so the session is
    /// not left mid-play.
    fn abandon_play(&self, user_id: &str) {
        if let Err(reason) = self.queue.finish_play(user_id, false) {
            warn!("[Game] Could not release the play for '{}': {:?}", user_id, reason);
        }
    }

    /// Expires sessions and stale entries, then announces the sweep.
    pub async fn sweep(&self) -> CleanupReport {
        let report = self.queue.cleanup();
        if report.total() > 0 {
            self.event_bus.publish(ClawEvent::QueueSwept(report)).await;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeliveryConfig, PrizeConfig, QueueConfig};
    use crate::test_utils::{ManualClock, ScriptedRandom};
    use clawbot_common::models::{AdmissionRequest, PrizeItem, PrizeType, QueueRejection};
    use clawbot_common::traits::Clock;

    fn service(rolls: Vec<f64>, stock: u32) -> (GameService, ManualClock) {
        let clock = ManualClock::fixed();
        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let queue = Arc::new(QueueManager::new(
            QueueConfig { max_concurrent_players: 1, max_plays_per_session: 2, ..QueueConfig::default() },
            clock_arc.clone(),
        ));
        let prizes = Arc::new(PrizeAllocator::new(
            PrizeConfig::default(),
            vec![PrizeItem::new("steam_5", PrizeType::Digital, "Steam $5", 5, "USD", "gaming", "steam", stock)],
            clock_arc.clone(),
            Box::new(ScriptedRandom::new(rolls).with_fallback(0.99)),
        ));
        let delivery = Arc::new(DeliveryDispatcher::new(DeliveryConfig::default(), clock_arc));
        let bus = Arc::new(EventBus::new());
        (GameService::new(queue, prizes, delivery, bus), clock)
    }

    fn play_request(user: &str) -> Admission {
        Admission::Play(AdmissionRequest {
            user_id: user.into(),
            username: user.into(),
            base_priority: 0,
            cost: 100,
            input: String::new(),
            redemption_id: format!("rd-{}", user),
            reward_title: "Claw".into(),
        })
    }

    #[tokio::test]
    async fn admission_then_win_then_loss() {
        // roll, prize pick, suffix bytes..., second roll
        let (svc, _) = service(vec![0.01, 0.5, 0.1, 0.2, 0.3, 0.9], 5);
        let mut rx = svc.event_bus().subscribe(Some(16)).await;

        assert!(matches!(svc.handle_admission(play_request("a")), AdmissionOutcome::Queued { .. }));
        assert_eq!(svc.promote_ready().await.len(), 1);

        let first = svc.play("a", None).await.unwrap();
        assert!(first.won(), "{:?}", first);
        assert_eq!(svc.prizes().prize("steam_5").unwrap().stock, 4);

        let second = svc.play("a", None).await.unwrap();
        assert!(!second.won());
        match &second {
            PlayOutcome::Played { receipt, .. } => assert!(receipt.completed),
            other => panic!("expected a play, got {:?}", other),
        }

        let stats = svc.queue().player_stats("a").unwrap();
        assert_eq!((stats.total_plays, stats.wins), (2, 1));

        let mut kinds = Vec::new();
        while let Ok(evt) = rx.try_recv() {
            kinds.push(evt.event_type());
        }
        assert_eq!(kinds, vec!["session.started", "prize.redeemed", "session.ended"]);
    }

    #[tokio::test]
    async fn play_without_session_is_rejected() {
        let (svc, _) = service(vec![], 1);
        match svc.play("ghost", None).await.unwrap() {
            PlayOutcome::Rejected { reason, .. } => assert_eq!(reason, SessionError::NoSession),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn winning_roll_on_empty_inventory_is_not_a_win() {
        let (svc, _) = service(vec![0.01], 0);
        svc.handle_admission(play_request("a"));
        svc.promote_ready().await;
        let out = svc.play("a", None).await.unwrap();
        assert!(!out.won());
        assert!(matches!(out, PlayOutcome::Played { prize: PrizeOutcome::OutOfStock { .. }, .. }));
        assert_eq!(svc.queue().player_stats("a").unwrap().wins, 0);
    }

    #[tokio::test]
    async fn bits_and_subscriptions_route_to_the_queue() {
        let (svc, _) = service(vec![], 1);
        let sub = Admission::Subscription {
            user_id: "s".into(),
            username: "s".into(),
            tier: "1000".into(),
            cumulative_months: 1,
        };
        assert_eq!(svc.handle_admission(sub), AdmissionOutcome::SubscriberFlagged);
        assert!(svc.queue().player_stats("s").unwrap().is_subscriber);

        svc.handle_admission(play_request("b"));
        let bits = Admission::Bits { user_id: "b".into(), username: "b".into(), bits: 100, message: String::new() };
        assert!(matches!(svc.handle_admission(bits), AdmissionOutcome::PlaysAdded { plays: 1, .. }));
        assert_eq!(
            svc.handle_admission(play_request("b")),
            AdmissionOutcome::Rejected { rejection: QueueRejection::AlreadyQueued }
        );
    }

    #[tokio::test]
    async fn abandoned_play_is_released_as_a_loss() {
        let (svc, _) = service(vec![0.99], 1);
        svc.handle_admission(play_request("a"));
        svc.promote_ready().await;
        svc.queue().begin_play("a").unwrap();

        svc.abandon_play("a");
        svc.abandon_play("ghost");
        let stats = svc.queue().player_stats("a").unwrap();
        assert_eq!((stats.total_plays, stats.wins), (1, 0));

        let next = svc.play("a", None).await.unwrap();
        assert!(matches!(next, PlayOutcome::Played { .. }), "{:?}", next);
    }

    #[tokio::test]
    async fn sweep_announces_expiry() {
        let (svc, clock) = service(vec![], 1);
        svc.handle_admission(play_request("a"));
        svc.promote_ready().await;
        let mut rx = svc.event_bus().subscribe(Some(4)).await;
        clock.advance(chrono::Duration::minutes(2));
        let report = svc.sweep().await;
        assert_eq!(report.expired_sessions, 1);
        assert!(matches!(rx.try_recv(), Ok(ClawEvent::QueueSwept(_))));
    }
}
