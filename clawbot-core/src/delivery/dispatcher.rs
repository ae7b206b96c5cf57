// File: clawbot-core/src/delivery/dispatcher.rs
//
// Routes a won prize to the right fulfilment path: a registered digital
// provider, the manual fallback, or physical shipping.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::RngCore;
use tracing::{info, warn};

use clawbot_common::models::{DeliveryInfo, DeliveryResult, PrizeItem, PrizeType};
use clawbot_common::traits::Clock;

use crate::Error;
use crate::config::DeliveryConfig;
use super::provider::DeliveryProvider;
use super::shipping;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalMethod {
    Code,
    Link,
}

pub struct ProviderRegistration {
    pub provider: Arc<dyn DeliveryProvider>,
    pub method: DigitalMethod,
    pub instructions: String,
}

pub struct DeliveryDispatcher {
    config: DeliveryConfig,
    clock: Arc<dyn Clock>,
    providers: HashMap<String, ProviderRegistration>,
}

impl DeliveryDispatcher {
    pub fn new(config: DeliveryConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock, providers: HashMap::new() }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Binds `key` (the `provider` field on prizes) to an implementation.
    pub fn register(
        &mut self,
        key: &str,
        provider: Arc<dyn DeliveryProvider>,
        method: DigitalMethod,
        instructions: &str,
    ) {
        info!("[Delivery] Registered provider '{}' ({:?})", key, method);
        self.providers.insert(
            key.to_string(),
            ProviderRegistration { provider, method, instructions: instructions.to_string() },
        );
    }

    /// One delivery attempt. Retrying is the caller's concern.
    pub async fn deliver(
        &self,
        prize: &PrizeItem,
        user_id: &str,
        info: &DeliveryInfo,
    ) -> Result<DeliveryResult, Error> {
        match prize.prize_type {
            PrizeType::Digital => self.deliver_digital(prize, user_id).await,
            PrizeType::Physical => Ok(self.deliver_physical(prize, info)),
        }
    }

    async fn deliver_digital(&self, prize: &PrizeItem, user_id: &str) -> Result<DeliveryResult, Error> {
        let Some(reg) = self.providers.get(&prize.provider) else {
            warn!("[Delivery] No provider '{}' for prize '{}' => manual code", prize.provider, prize.id);
            return Ok(DeliveryResult::Manual {
                code: manual_code(),
                instructions: "Contact support to redeem your prize.".to_string(),
            });
        };

        let timeout = self.config.provider_timeout();
        match reg.method {
            DigitalMethod::Code => {
                let code = tokio::time::timeout(timeout, reg.provider.generate_code(prize, user_id)).await??;
                Ok(DeliveryResult::Code { code, instructions: reg.instructions.clone() })
            }
            DigitalMethod::Link => {
                let url = tokio::time::timeout(timeout, reg.provider.generate_link(prize, user_id)).await??;
                Ok(DeliveryResult::Link {
                    url,
                    instructions: reg.instructions.clone(),
                    expires_at: self
                        .clock
                        .now()
                        .checked_add_signed(self.config.link_ttl())
                        .unwrap_or(DateTime::<Utc>::MAX_UTC),
                })
            }
        }
    }

    fn deliver_physical(&self, prize: &PrizeItem, info: &DeliveryInfo) -> DeliveryResult {
        if !info.has_shipping_address() {
            return DeliveryResult::PendingAddress {
                message: "We need your shipping address to send the prize.".to_string(),
            };
        }
        let region = info.region.as_deref();
        let cost = self.shipping_cost(prize, region);
        DeliveryResult::Shipping {
            carrier: self.config.default_carrier.clone(),
            tracking_number: None,
            estimated_delivery: self.estimate_delivery(region),
            address: info.clone(),
            shipping_cost: cost,
            free_shipping: cost == 0,
        }
    }

    pub fn shipping_cost(&self, prize: &PrizeItem, region: Option<&str>) -> u64 {
        shipping::shipping_cost(&self.config, prize.value, region)
    }

    pub fn estimate_delivery(&self, region: Option<&str>) -> chrono::NaiveDate {
        shipping::estimate_delivery(&self.config, self.clock.now().date_naive(), region)
    }
}

fn manual_code() -> String {
    let mut bytes = [0u8; 4];
    rand::rng().fill_bytes(&mut bytes);
    format!("OC-{}", hex::encode_upper(bytes))
}

/// Chat text announcing how the prize will reach the winner.
pub fn prize_message(prize: &PrizeItem, result: &DeliveryResult) -> String {
    match result {
        DeliveryResult::Link { url, .. } => format!("🎁 Your gift card: {}", url),
        DeliveryResult::Code { code, .. } => format!("🎮 Your {} code: `{}`", prize.name, code),
        DeliveryResult::Manual { code, .. } => {
            format!("🎮 Your claim code for {}: `{}` (support will finish the delivery)", prize.name, code)
        }
        DeliveryResult::PendingAddress { .. } => format!("📦 We need your address to ship: {}", prize.name),
        DeliveryResult::Shipping { .. } => format!("🚚 Your prize {} is on its way!", prize.name),
    }
}
