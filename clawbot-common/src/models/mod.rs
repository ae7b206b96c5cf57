// File: clawbot-common/src/models/mod.rs

pub mod admission;
pub mod delivery;
pub mod player;
pub mod prize;
pub mod queue;

pub use admission::*;
pub use delivery::*;
pub use player::*;
pub use prize::*;
pub use queue::*;
