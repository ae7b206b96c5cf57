// File: clawbot-common/src/traits/mod.rs

pub mod clock_traits;
pub mod random_traits;
pub mod sink_traits;

pub use clock_traits::{Clock, SystemClock};
pub use random_traits::RandomSource;
pub use sink_traits::RedemptionSink;
