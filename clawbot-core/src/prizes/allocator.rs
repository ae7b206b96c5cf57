// File: clawbot-core/src/prizes/allocator.rs
//
// Win rolls, stock-weighted prize selection and redemption. The inventory
// sits behind one mutex; stock is reserved under it and delivered outside it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use clawbot_common::models::{
    DeliveryInfo, DeliveryResult, InventoryStatus, PlayerStats, PrizeDashboard, PrizeFilter,
    PrizeItem, PrizeOutcome, PrizeType, RedeemOutcome, Redemption, RedemptionCounters,
    RedemptionStatus, StockSummary, TopPrize, WinDecision,
};
use clawbot_common::traits::{Clock, RandomSource};

use crate::Error;
use crate::config::PrizeConfig;
use crate::delivery::{prize_message, DeliveryDispatcher};
use crate::utils::time::{base36_millis, utc_day};

const TOP_PRIZES: usize = 5;

/// Win probability for a player, in `[0, 1]`.
///
/// A loss streak above the threshold raises the base rate by `step` per
/// loss, capped; subscriber and VIP bonuses are added on top of that.
pub fn win_chance(stats: &PlayerStats, config: &PrizeConfig) -> f64 {
    let mut chance = config.base_win_rate;
    let streak = stats.loss_streak();
    if streak > config.loss_streak_threshold {
        chance = (chance + config.loss_streak_step * f64::from(streak)).min(config.loss_streak_cap);
    }
    if stats.is_subscriber {
        chance += config.subscriber_bonus;
    }
    if stats.is_vip {
        chance += config.vip_bonus;
    }
    chance.clamp(0.0, 1.0)
}

/// Index of the prize hit by `unit` when each prize is weighted by its
/// stock. `None` if nothing is in stock.
pub fn pick_weighted(prizes: &[PrizeItem], unit: f64) -> Option<usize> {
    let total: u64 = prizes.iter().map(|p| u64::from(p.stock)).sum();
    if total == 0 {
        return None;
    }
    let mut pick = ((unit.clamp(0.0, 1.0) * total as f64).floor() as u64).min(total - 1);
    for (i, prize) in prizes.iter().enumerate() {
        let stock = u64::from(prize.stock);
        if pick < stock {
            return Some(i);
        }
        pick -= stock;
    }
    None
}

/// An OS-seeded generator, or a reproducible one when `seed` is set.
pub fn rng_from_seed(seed: Option<u64>) -> Box<dyn RandomSource> {
    match seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(StdRng::from_os_rng()),
    }
}

#[derive(Debug, Default)]
struct DailyTally {
    count: u32,
    value: BTreeMap<String, u64>,
}

#[derive(Default)]
struct InventoryState {
    prizes: Vec<PrizeItem>,
    redemptions: Vec<Redemption>,
    daily: HashMap<NaiveDate, DailyTally>,
    counters: RedemptionCounters,
    total_value: BTreeMap<String, u64>,
    reconciliation: Vec<String>,
}

impl InventoryState {
    fn position(&self, prize_id: &str) -> Option<usize> {
        self.prizes.iter().position(|p| p.id == prize_id)
    }
}

pub struct PrizeAllocator {
    config: PrizeConfig,
    clock: Arc<dyn Clock>,
    inventory: Mutex<InventoryState>,
    // Locked after `inventory` when both are needed.
    rng: Mutex<Box<dyn RandomSource>>,
}

impl PrizeAllocator {
    pub fn new(
        config: PrizeConfig,
        catalog: Vec<PrizeItem>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        info!("[Prizes] Inventory initialized with {} items", catalog.len());
        Self {
            config,
            clock,
            inventory: Mutex::new(InventoryState { prizes: catalog, ..InventoryState::default() }),
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &PrizeConfig {
        &self.config
    }

    /// One uniform roll against the player's win chance.
    pub fn determine_win(&self, stats: &PlayerStats) -> WinDecision {
        let chance = win_chance(stats, &self.config);
        let roll = self.rng.lock().next_unit();
        WinDecision { did_win: roll < chance, win_chance: chance, roll }
    }

    /// Picks what a winning roll earns. Does not touch stock; the pick is
    /// only reserved by [`PrizeAllocator::redeem`].
    pub fn select_prize(&self, decision: &WinDecision) -> PrizeOutcome {
        let mut inv = self.inventory.lock();
        if !decision.did_win {
            inv.counters.losses += 1;
            return PrizeOutcome::Loss { message: "So close! Keep trying 🎯".to_string() };
        }

        let unit = self.rng.lock().next_unit();
        match pick_weighted(&inv.prizes, unit) {
            Some(idx) => {
                let prize = inv.prizes[idx].clone();
                let message = format!("CONGRATULATIONS! You won: {} {}", prize.name, prize.image)
                    .trim_end()
                    .to_string();
                PrizeOutcome::Win { prize, message }
            }
            None => {
                inv.counters.out_of_stock += 1;
                warn!("[Prizes] Winning roll with an empty inventory");
                PrizeOutcome::OutOfStock {
                    message: "Sorry! We're out of prizes for today 😢".to_string(),
                }
            }
        }
    }

    /// Takes one unit of `prize_id` and delivers it.
    ///
    /// The daily cap and stock are checked and the unit is reserved in one
    /// critical section. Delivery runs without the lock and is retried up to
    /// `delivery_attempts` times. A delivery that never succeeds leaves the
    /// stock taken and the redemption `failed`.
    pub async fn redeem(
        &self,
        prize_id: &str,
        user_id: &str,
        username: &str,
        info: &DeliveryInfo,
        dispatcher: &DeliveryDispatcher,
    ) -> Result<RedeemOutcome, Error> {
        let now = self.clock.now();
        let day = utc_day(now);

        let (prize, redemption_id) = {
            let mut inv = self.inventory.lock();
            let idx = inv
                .position(prize_id)
                .ok_or_else(|| Error::NotFound(format!("prize '{}'", prize_id)))?;

            let today = inv.daily.get(&day).map_or(0, |d| d.count);
            if today >= self.config.max_daily_prizes {
                info!("[Prizes] Daily cap of {} reached; refusing '{}'", self.config.max_daily_prizes, prize_id);
                return Ok(RedeemOutcome::DailyLimitReached {
                    message: "That's all the prizes for today. Come back tomorrow! 🕛".to_string(),
                });
            }
            if inv.prizes[idx].stock == 0 {
                inv.counters.out_of_stock += 1;
                return Ok(RedeemOutcome::OutOfStock {
                    message: format!("Sorry! {} just ran out 😢", inv.prizes[idx].name),
                });
            }

            let prize = &mut inv.prizes[idx];
            prize.stock -= 1;
            prize.redemptions += 1;
            let prize = prize.clone();

            let tally = inv.daily.entry(day).or_default();
            tally.count += 1;
            let value = tally.value.entry(prize.currency.clone()).or_default();
            *value = value.saturating_add(prize.value);

            let mut suffix = [0u8; 3];
            self.rng.lock().fill_random(&mut suffix);
            let id = format!("RD-{}-{}", base36_millis(now), hex::encode_upper(suffix));
            (prize, id)
        };

        let delivery_cfg = dispatcher.config();
        let max_attempts = delivery_cfg.delivery_attempts.max(1);
        let mut attempts = 0;
        let mut failure = None;
        let mut delivery: Option<DeliveryResult> = None;
        while attempts < max_attempts {
            attempts += 1;
            match dispatcher.deliver(&prize, user_id, info).await {
                Ok(result) => {
                    delivery = Some(result);
                    break;
                }
                Err(e) => {
                    warn!(
                        "[Prizes] Delivery of {} for {} failed (attempt {}/{}): {}",
                        redemption_id, username, attempts, max_attempts, e
                    );
                    failure = Some(e.to_string());
                    if attempts < max_attempts {
                        let backoff = delivery_cfg.retry_backoff_ms.saturating_mul(u64::from(attempts));
                        tokio::time::sleep(std::time::Duration::from_millis(backoff)).await;
                    }
                }
            }
        }

        let (status, message) = match &delivery {
            Some(result) if result.is_pending() => (RedemptionStatus::PendingAddress, prize_message(&prize, result)),
            Some(result) => (RedemptionStatus::Completed, prize_message(&prize, result)),
            None => (
                RedemptionStatus::Failed,
                format!(
                    "We couldn't deliver {} right now. Support will reach out with code {}.",
                    prize.name, redemption_id
                ),
            ),
        };

        let redemption = Redemption {
            id: redemption_id,
            prize_id: prize.id.clone(),
            prize_name: prize.name.clone(),
            user_id: user_id.to_string(),
            username: username.to_string(),
            prize_type: prize.prize_type,
            value: prize.value,
            currency: prize.currency.clone(),
            status,
            delivery,
            failure: if status == RedemptionStatus::Failed { failure } else { None },
            attempts,
            created_at: now,
        };

        {
            let mut inv = self.inventory.lock();
            inv.counters.total += 1;
            match prize.prize_type {
                PrizeType::Digital => inv.counters.digital += 1,
                PrizeType::Physical => inv.counters.physical += 1,
            }
            let value = inv.total_value.entry(prize.currency.clone()).or_default();
            *value = value.saturating_add(prize.value);
            if status == RedemptionStatus::Failed {
                inv.counters.failed_deliveries += 1;
                inv.reconciliation.push(redemption.id.clone());
            }
            inv.redemptions.push(redemption.clone());
        }

        match status {
            RedemptionStatus::Failed => warn!(
                "[Prizes] {} needs manual reconciliation ({} for {})",
                redemption.id, prize.id, username
            ),
            _ => info!("[Prizes] {} redeemed {} ({})", username, prize.name, redemption.id),
        }
        Ok(RedeemOutcome::Redeemed { redemption, message })
    }

    /// Restocks a prize. Returns the new stock.
    pub fn add_stock(&self, prize_id: &str, amount: u32) -> Result<u32, Error> {
        let mut inv = self.inventory.lock();
        let idx = inv
            .position(prize_id)
            .ok_or_else(|| Error::NotFound(format!("prize '{}'", prize_id)))?;
        let prize = &mut inv.prizes[idx];
        prize.stock = prize.stock.saturating_add(amount);
        Ok(prize.stock)
    }

    /// Adds or replaces a prize. An empty id gets a generated one.
    pub fn add_prize(&self, mut prize: PrizeItem) -> String {
        if prize.id.is_empty() {
            prize.id = uuid::Uuid::new_v4().to_string();
        }
        prize.redemptions = 0;
        prize.created_at.get_or_insert(self.clock.now());
        let id = prize.id.clone();

        let mut inv = self.inventory.lock();
        match inv.position(&id) {
            Some(idx) => inv.prizes[idx] = prize,
            None => inv.prizes.push(prize),
        }
        id
    }

    pub fn prize(&self, prize_id: &str) -> Option<PrizeItem> {
        let inv = self.inventory.lock();
        inv.position(prize_id).map(|i| inv.prizes[i].clone())
    }

    pub fn available_prizes(&self, filter: &PrizeFilter) -> Vec<PrizeItem> {
        self.inventory
            .lock()
            .prizes
            .iter()
            .filter(|p| p.in_stock() && filter.matches(p))
            .cloned()
            .collect()
    }

    pub fn total_stock(&self) -> u64 {
        self.inventory.lock().prizes.iter().map(|p| u64::from(p.stock)).sum()
    }

    pub fn inventory_status(&self) -> InventoryStatus {
        let inv = self.inventory.lock();
        self.inventory_status_locked(&inv)
    }

    fn inventory_status_locked(&self, inv: &InventoryState) -> InventoryStatus {
        let summarize = |kind: PrizeType, threshold: u32| {
            let mut summary = StockSummary::default();
            for p in inv.prizes.iter().filter(|p| p.prize_type == kind) {
                summary.total += 1;
                if p.stock > 0 {
                    summary.in_stock += 1;
                    if p.stock < threshold {
                        summary.low_stock += 1;
                        summary.low_stock_ids.push(p.id.clone());
                    }
                }
            }
            summary
        };

        let mut stock_value = BTreeMap::new();
        for p in &inv.prizes {
            let total = stock_value.entry(p.currency.clone()).or_insert(0u64);
            *total = total.saturating_add(p.value.saturating_mul(u64::from(p.stock)));
        }

        InventoryStatus {
            digital: summarize(PrizeType::Digital, self.config.low_stock_digital),
            physical: summarize(PrizeType::Physical, self.config.low_stock_physical),
            stock_value,
        }
    }

    /// Most recent redemptions first.
    pub fn redemptions_tail(&self, n: usize) -> Vec<Redemption> {
        self.inventory.lock().redemptions.iter().rev().take(n).cloned().collect()
    }

    pub fn dashboard(&self) -> PrizeDashboard {
        let now = self.clock.now();
        let inv = self.inventory.lock();
        let today = inv.daily.get(&utc_day(now));

        let mut counters = inv.counters.clone();
        counters.today = today.map_or(0, |d| d.count);

        let mut ranked: Vec<&PrizeItem> = inv.prizes.iter().collect();
        ranked.sort_by(|a, b| b.redemptions.cmp(&a.redemptions));
        let top_prizes = ranked
            .into_iter()
            .take(TOP_PRIZES)
            .map(|p| TopPrize { name: p.name.clone(), redemptions: p.redemptions, stock: p.stock })
            .collect();

        PrizeDashboard {
            redemptions: counters,
            total_value: inv.total_value.clone(),
            today_value: today.map(|d| d.value.clone()).unwrap_or_default(),
            inventory: self.inventory_status_locked(&inv),
            recent_redemptions: inv.redemptions.iter().rev().take(self.config.history_tail).cloned().collect(),
            top_prizes,
            reconciliation: inv.reconciliation.clone(),
            timestamp: now,
        }
    }
}
