// File: clawbot-core/src/delivery/provider.rs

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use clawbot_common::models::PrizeItem;

use crate::Error;
use crate::http::HttpClient;

/// A source of redeemable digital rewards (gift card codes, claim links).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    async fn generate_code(&self, prize: &PrizeItem, user_id: &str) -> Result<String, Error>;
    async fn generate_link(&self, prize: &PrizeItem, user_id: &str) -> Result<String, Error>;
}

const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generates codes and links locally. Used where the reward is fulfilled by
/// hand from a pre-bought stock of keys.
pub struct OfflineCodeProvider {
    link_base: String,
}

impl OfflineCodeProvider {
    pub fn new(link_base: &str) -> Self {
        Self { link_base: link_base.trim_end_matches('/').to_string() }
    }

    /// Three groups of five, e.g. `7KQ2M-XW9PA-ZD3FH`.
    pub fn random_code() -> String {
        let mut rng = rand::rng();
        (0..3)
            .map(|_| {
                (0..5)
                    .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl Default for OfflineCodeProvider {
    fn default() -> Self {
        Self::new("https://reward.link")
    }
}

#[async_trait]
impl DeliveryProvider for OfflineCodeProvider {
    async fn generate_code(&self, _prize: &PrizeItem, _user_id: &str) -> Result<String, Error> {
        Ok(Self::random_code())
    }

    async fn generate_link(&self, prize: &PrizeItem, user_id: &str) -> Result<String, Error> {
        Ok(format!("{}/{}/{}", self.link_base, prize.id, user_id))
    }
}

#[derive(Debug, Deserialize)]
struct ProviderCodeResponse {
    code: String,
}

#[derive(Debug, Deserialize)]
struct ProviderLinkResponse {
    url: String,
}

/// Adapter for gift-card APIs that take a JSON order and answer with a code
/// (`{"code": ...}`) or a claim link (`{"url": ...}`).
pub struct HttpRewardProvider {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    api_key: String,
}

impl HttpRewardProvider {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: &str, api_key: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn order(&self, endpoint: &str, prize: &PrizeItem, user_id: &str) -> Result<String, Error> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let body = serde_json::json!({
            "sku": prize.id,
            "recipient": user_id,
            "value": prize.value,
            "currency": prize.currency,
        });
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), format!("Bearer {}", self.api_key));
        debug!("[HttpRewardProvider] POST {} for prize '{}'", url, prize.id);
        self.http_client.post_json(url, body, headers).await
    }
}

#[async_trait]
impl DeliveryProvider for HttpRewardProvider {
    async fn generate_code(&self, prize: &PrizeItem, user_id: &str) -> Result<String, Error> {
        let text = self.order("codes", prize, user_id).await?;
        let resp: ProviderCodeResponse = serde_json::from_str(&text)?;
        Ok(resp.code)
    }

    async fn generate_link(&self, prize: &PrizeItem, user_id: &str) -> Result<String, Error> {
        let text = self.order("links", prize, user_id).await?;
        let resp: ProviderLinkResponse = serde_json::from_str(&text)?;
        Ok(resp.url)
    }
}
