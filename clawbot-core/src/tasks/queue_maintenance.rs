// clawbot-core/src/tasks/queue_maintenance.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use clawbot_common::traits::Clock;

use crate::eventbus::EventBus;
use crate::ingestion::MessageIdCache;
use crate::services::GameService;

/// Spawns a background task that periodically expires sessions, evicts
/// stale queue entries and prunes old webhook message ids.
pub fn spawn_queue_maintenance_task(
    game: Arc<GameService>,
    dedup: Arc<MessageIdCache>,
    clock: Arc<dyn Clock>,
    event_bus: &EventBus,
    interval: Duration,
) -> JoinHandle<()> {
    let mut shutdown_rx = event_bus.shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    game.sweep().await;
                    let pruned = dedup.prune(clock.now());
                    if pruned > 0 {
                        debug!("[Maintenance] Pruned {} webhook message ids", pruned);
                    }
                }
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Queue maintenance shutting down => break from loop.");
                        break;
                    }
                }
            }
        }
    })
}
