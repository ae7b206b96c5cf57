// clawbot-core/src/tasks/scheduler.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::info;

use crate::eventbus::EventBus;
use crate::services::GameService;

/// Spawns the loop that moves waiting players into free machine slots.
/// Capacity is checked inside the queue, so a tick never overfills.
pub fn spawn_scheduler_task(
    game: Arc<GameService>,
    event_bus: &EventBus,
    interval: Duration,
) -> JoinHandle<()> {
    let mut shutdown_rx = event_bus.shutdown_rx.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    let started = game.promote_ready().await;
                    if !started.is_empty() {
                        info!("[Scheduler] Started {} session(s)", started.len());
                    }
                }
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Scheduler shutting down => break from loop.");
                        break;
                    }
                }
            }
        }
    })
}
