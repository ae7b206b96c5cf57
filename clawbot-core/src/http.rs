//! HTTP client abstraction for reward-provider integrations.
//!
//! Provider adapters talk to remote APIs through [`HttpClient`] so they can be
//! exercised in tests without network access. The default implementation
//! wraps reqwest.

use async_trait::async_trait;
use reqwest;
use std::collections::HashMap;
use std::time::Duration;
use crate::Error;

/// A generic trait for making HTTP requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn post_json(
        &self,
        url: String,
        body: serde_json::Value,
        headers: HashMap<String, String>,
    ) -> Result<String, Error>;
}

#[derive(Clone)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Default for DefaultHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    async fn post_json(
        &self,
        url: String,
        body: serde_json::Value,
        headers: HashMap<String, String>,
    ) -> Result<String, Error> {
        let mut request = self.client.post(&url).json(&body);
        for (key, value) in headers {
            request = request.header(&key, value);
        }
        let response = request
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(response)
    }
}
