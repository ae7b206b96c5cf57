// File: clawbot-core/src/queue/mod.rs

pub mod manager;

pub use manager::{compute_priority, QueueManager};
