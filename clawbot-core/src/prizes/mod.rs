// File: clawbot-core/src/prizes/mod.rs

pub mod allocator;
pub mod catalog;

pub use allocator::{pick_weighted, rng_from_seed, win_chance, PrizeAllocator};
pub use catalog::default_catalog;
