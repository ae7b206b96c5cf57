//! src/eventbus/redemption_logger.rs
//!
//! Subscribes to the EventBus, buffers `ClawEvent::PrizeRedeemed` and flushes
//! them to a [`RedemptionSink`]. Drains the queue on shutdown, then does a
//! final flush.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{error, info};

use clawbot_common::models::Redemption;
use clawbot_common::traits::RedemptionSink;

use crate::Error;
use crate::eventbus::{ClawEvent, EventBus};

/// Appends redemptions as JSON lines to a file.
pub struct JsonlRedemptionSink {
    path: PathBuf,
}

impl JsonlRedemptionSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RedemptionSink for JsonlRedemptionSink {
    async fn append(&self, batch: &[Redemption]) -> Result<(), Error> {
        let mut out = Vec::new();
        for r in batch {
            serde_json::to_writer(&mut out, r)?;
            out.push(b'\n');
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&out).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Spawns the logger. Subscribes before returning, so nothing published after
/// this call is missed. Await the handle to wait for the final flush.
pub async fn spawn_redemption_logger_task(
    event_bus: &EventBus,
    sink: Arc<dyn RedemptionSink>,
    batch_size: usize,
    flush_interval: Duration,
) -> JoinHandle<()> {
    let batch_size = batch_size.max(1);
    let mut rx = event_bus.subscribe(Some(batch_size * 4)).await;
    let mut shutdown_rx = event_bus.shutdown_rx.clone();

    tokio::spawn(async move {
        let mut buffer: Vec<Redemption> = Vec::with_capacity(batch_size);
        let mut last_flush = Instant::now();

        info!(
            "Redemption logger started with batch_size={} flush_interval={:?}",
            batch_size, flush_interval
        );

        loop {
            tokio::select! {
                biased;
                maybe_event = rx.recv() => {
                    match maybe_event {
                        Some(ClawEvent::PrizeRedeemed(r)) => {
                            buffer.push(r);
                            if buffer.len() >= batch_size {
                                flush(sink.as_ref(), &mut buffer).await;
                                last_flush = Instant::now();
                            }
                        }
                        Some(_) => {}
                        None => {
                            info!("Redemption logger channel closed => break from loop.");
                            break;
                        }
                    }
                },
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Redemption logger shutting down => break from loop.");
                        break;
                    }
                },
                _ = sleep(flush_interval) => {
                    if !buffer.is_empty() && last_flush.elapsed() >= flush_interval {
                        flush(sink.as_ref(), &mut buffer).await;
                        last_flush = Instant::now();
                    }
                }
            }
        }

        while let Ok(event) = rx.try_recv() {
            if let ClawEvent::PrizeRedeemed(r) = event {
                buffer.push(r);
            }
        }
        if !buffer.is_empty() {
            info!("Redemption logger final flush: {} records remain.", buffer.len());
            flush(sink.as_ref(), &mut buffer).await;
        }
        info!("Redemption logger task exited completely.");
    })
}

async fn flush(sink: &dyn RedemptionSink, buffer: &mut Vec<Redemption>) {
    if buffer.is_empty() {
        return;
    }
    match sink.append(buffer).await {
        Ok(()) => buffer.clear(),
        // Kept for the next flush.
        Err(e) => error!("Error appending {} redemptions: {:?}", buffer.len(), e),
    }
}
