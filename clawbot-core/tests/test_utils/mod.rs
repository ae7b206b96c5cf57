// File: clawbot-core/tests/test_utils/mod.rs
//
// Builds a fully wired game (ingestion, queue, prizes, delivery, bus) on a
// manual clock for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use clawbot_common::models::PrizeItem;
use clawbot_common::traits::{Clock, RandomSource};
use clawbot_core::config::ClawConfig;
use clawbot_core::delivery::DeliveryDispatcher;
use clawbot_core::eventbus::EventBus;
use clawbot_core::ingestion::EventIngestion;
use clawbot_core::prizes::{default_catalog, PrizeAllocator};
use clawbot_core::queue::QueueManager;
use clawbot_core::services::GameService;
use clawbot_core::test_utils::ManualClock;
use clawbot_core::web::{self, AppState};

pub const SECRET: &str = "integration-secret";
pub const CONTROLLER_TOKEN: &str = "controller-token";

pub struct Harness {
    pub clock: ManualClock,
    pub bus: Arc<EventBus>,
    pub ingestion: Arc<EventIngestion>,
    pub game: Arc<GameService>,
}

impl Harness {
    pub fn new(rng: Box<dyn RandomSource>) -> Self {
        let clock = ManualClock::fixed();
        Self::with_catalog(rng, default_catalog(clock.now()), clock)
    }

    pub fn with_catalog(rng: Box<dyn RandomSource>, catalog: Vec<PrizeItem>, clock: ManualClock) -> Self {
        let mut config = ClawConfig::default();
        config.webhook.secret = SECRET.to_string();
        config.api.controller_token = CONTROLLER_TOKEN.to_string();
        config.queue.max_concurrent_players = 1;
        config.delivery.retry_backoff_ms = 1;

        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let bus = Arc::new(EventBus::new());
        let ingestion = Arc::new(EventIngestion::new(config.webhook.clone(), clock_arc.clone()));
        let queue = Arc::new(QueueManager::new(config.queue.clone(), clock_arc.clone()));
        let prizes = Arc::new(PrizeAllocator::new(config.prizes.clone(), catalog, clock_arc.clone(), rng));
        let delivery = Arc::new(DeliveryDispatcher::new(config.delivery.clone(), clock_arc));
        let game = Arc::new(GameService::new(queue, prizes, delivery, bus.clone()));
        Self { clock, bus, ingestion, game }
    }

    pub fn router(&self) -> Router {
        self.router_with_timeout(Duration::from_secs(5))
    }

    pub fn router_with_timeout(&self, request_timeout: Duration) -> Router {
        web::router(
            AppState {
                ingestion: self.ingestion.clone(),
                game: self.game.clone(),
                event_bus: self.bus.clone(),
                controller_token: CONTROLLER_TOKEN.into(),
            },
            request_timeout,
        )
    }
}

/// Polls `cond` until it holds or a second passes.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
