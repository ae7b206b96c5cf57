// clawbot-core/src/tasks/admission_worker.rs

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::eventbus::{ClawEvent, EventBus};
use crate::services::GameService;

/// Subscribes to the bus and applies every `ClawEvent::Admission` to the
/// game, one at a time and in publish order. Drains what is queued when
/// shutdown is signalled.
pub async fn spawn_admission_worker(game: Arc<GameService>, event_bus: &EventBus) -> JoinHandle<()> {
    let mut rx = event_bus.subscribe(None).await;
    let mut shutdown_rx = event_bus.shutdown_rx.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(ClawEvent::Admission { message_id, admission, .. }) => {
                            let outcome = game.handle_admission(admission);
                            info!("[Admission] {} => {}", message_id, outcome.message());
                        }
                        Some(_) => {}
                        None => break,
                    }
                },
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Admission worker shutting down => break from loop.");
                        break;
                    }
                }
            }
        }

        while let Ok(event) = rx.try_recv() {
            if let ClawEvent::Admission { admission, .. } = event {
                game.handle_admission(admission);
            }
        }
    })
}
