use async_trait::async_trait;

use crate::Error;
use crate::models::Redemption;

/// Durable destination for the append-only redemption log.
#[async_trait]
pub trait RedemptionSink: Send + Sync {
    async fn append(&self, batch: &[Redemption]) -> Result<(), Error>;
}
