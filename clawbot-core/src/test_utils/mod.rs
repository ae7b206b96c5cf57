// File: clawbot-core/src/test_utils/mod.rs
//
// Deterministic stand-ins for the injected seams (clock, randomness,
// delivery providers, redemption sink). Used by unit and integration tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;

use clawbot_common::models::{PrizeItem, Redemption};
use clawbot_common::traits::{Clock, RandomSource, RedemptionSink};

use crate::Error;
use crate::delivery::DeliveryProvider;

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// 2025-01-01T12:00:00Z, a fixed midday start.
    pub fn fixed() -> Self {
        Self::new(Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Replays a fixed list of draws, then repeats `fallback`.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
    fallback: f64,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self { values: values.into_iter().collect(), fallback: 0.5 }
    }

    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        self.values.pop_front().unwrap_or(self.fallback)
    }
}

/// Provider that fails a set number of times before answering.
pub struct FlakyProvider {
    failures_left: AtomicU32,
    pub calls: AtomicU32,
}

impl FlakyProvider {
    pub fn new(failures: u32) -> Self {
        Self { failures_left: AtomicU32::new(failures), calls: AtomicU32::new(0) }
    }

    pub fn always_failing() -> Self {
        Self::new(u32::MAX)
    }

    fn attempt(&self) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            if left != u32::MAX {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(Error::Provider("provider unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryProvider for FlakyProvider {
    async fn generate_code(&self, prize: &PrizeItem, user_id: &str) -> Result<String, Error> {
        self.attempt()?;
        Ok(format!("CODE-{}-{}", prize.id.to_uppercase(), user_id))
    }

    async fn generate_link(&self, prize: &PrizeItem, user_id: &str) -> Result<String, Error> {
        self.attempt()?;
        Ok(format!("https://rewards.test/{}/{}", prize.id, user_id))
    }
}

/// Collects everything appended to it.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub records: Arc<Mutex<Vec<Redemption>>>,
}

#[async_trait]
impl RedemptionSink for MemorySink {
    async fn append(&self, batch: &[Redemption]) -> Result<(), Error> {
        self.records.lock().extend_from_slice(batch);
        Ok(())
    }
}
