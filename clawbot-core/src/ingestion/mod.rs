// File: clawbot-core/src/ingestion/mod.rs
//
// Webhook intake: signature check, envelope parsing, normalization and
// message-id dedup. Produces at most one Admission per delivery.

pub mod dedup;
pub mod events;
pub mod normalize;
pub mod signature;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::HeaderMap;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use clawbot_common::models::Admission;
use clawbot_common::traits::Clock;

use crate::Error;
use crate::config::WebhookConfig;
pub use dedup::MessageIdCache;
use events::{
    WebhookEnvelope, MESSAGE_TYPE_NOTIFICATION, MESSAGE_TYPE_REVOCATION,
    MESSAGE_TYPE_VERIFICATION,
};
pub use normalize::normalize;
pub use signature::{sign, verify};

pub const HEADER_MESSAGE_ID: &str = "Twitch-Eventsub-Message-Id";
pub const HEADER_MESSAGE_TYPE: &str = "Twitch-Eventsub-Message-Type";
pub const HEADER_MESSAGE_TIMESTAMP: &str = "Twitch-Eventsub-Message-Timestamp";
pub const HEADER_MESSAGE_SIGNATURE: &str = "Twitch-Eventsub-Message-Signature";

/// The delivery headers the pipeline cares about.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    pub message_id: String,
    pub message_type: String,
    pub timestamp: String,
    pub signature: String,
}

impl WebhookHeaders {
    pub fn from_header_map(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        Self {
            message_id: get(HEADER_MESSAGE_ID),
            message_type: get(HEADER_MESSAGE_TYPE),
            timestamp: get(HEADER_MESSAGE_TIMESTAMP),
            signature: get(HEADER_MESSAGE_SIGNATURE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// Callback verification; the challenge must be echoed back verbatim.
    Challenge(String),
    /// Same message id seen inside the dedup window.
    Duplicate { message_id: String },
    Ignored { event_type: String },
    Revoked { event_type: String },
    Accepted {
        message_id: String,
        admission: Admission,
        received_at: DateTime<Utc>,
    },
}

pub struct EventIngestion {
    config: WebhookConfig,
    dedup: Arc<MessageIdCache>,
    clock: Arc<dyn Clock>,
}

impl EventIngestion {
    pub fn new(config: WebhookConfig, clock: Arc<dyn Clock>) -> Self {
        let dedup = Arc::new(MessageIdCache::new(config.dedup_window(), config.dedup_max_entries));
        Self { config, dedup, clock }
    }

    /// Releases an accepted message id so a redelivery is processed again.
    pub fn forget(&self, message_id: &str) -> bool {
        self.dedup.forget(message_id)
    }

    /// Shared with the maintenance task, which prunes it.
    pub fn dedup(&self) -> Arc<MessageIdCache> {
        self.dedup.clone()
    }

    /// Runs one raw delivery through the pipeline. Nothing is recorded
    /// unless the signature checks out and the payload parses.
    pub fn process(&self, headers: &WebhookHeaders, raw_body: &[u8]) -> Result<IngestOutcome, Error> {
        let message = signature::signed_message(
            self.config.scheme,
            &headers.message_id,
            &headers.timestamp,
            raw_body,
        );
        if !verify(&message, &headers.signature, &self.config.secret) {
            warn!(
                target: "security",
                "[Ingestion] Rejected webhook with invalid signature (message_id='{}')",
                headers.message_id
            );
            return Err(Error::Signature("signature mismatch".into()));
        }

        let envelope: WebhookEnvelope = serde_json::from_slice::<serde_json::Value>(raw_body)
            .map_err(|e| Error::Payload { path: ".".into(), message: e.to_string() })
            .and_then(|v| normalize::parse_payload(&v))?;
        let event_type = envelope.subscription.sub_type.clone();

        let message_type = if headers.message_type.is_empty() {
            // Bodies without the type header: a challenge means verification.
            if envelope.challenge.is_some() { MESSAGE_TYPE_VERIFICATION } else { MESSAGE_TYPE_NOTIFICATION }
        } else {
            headers.message_type.as_str()
        };

        match message_type {
            MESSAGE_TYPE_VERIFICATION => {
                let challenge = envelope.challenge.ok_or_else(|| Error::Payload {
                    path: "challenge".into(),
                    message: "missing field `challenge`".into(),
                })?;
                info!("[Ingestion] Answering callback verification for '{}'", event_type);
                Ok(IngestOutcome::Challenge(challenge))
            }
            MESSAGE_TYPE_REVOCATION => {
                warn!(
                    "[Ingestion] Subscription '{}' revoked (status='{}')",
                    event_type, envelope.subscription.status
                );
                Ok(IngestOutcome::Revoked { event_type })
            }
            MESSAGE_TYPE_NOTIFICATION => {
                let payload = envelope.event.ok_or_else(|| Error::Payload {
                    path: "event".into(),
                    message: "missing field `event`".into(),
                })?;
                let Some(admission) = normalize(&event_type, &payload)? else {
                    return Ok(IngestOutcome::Ignored { event_type });
                };

                let message_id = if headers.message_id.is_empty() {
                    hex::encode(Sha256::digest(raw_body))
                } else {
                    headers.message_id.clone()
                };
                let now = self.clock.now();
                if !self.dedup.check_and_insert(&message_id, now) {
                    info!("[Ingestion] Duplicate delivery '{}' => no-op", message_id);
                    return Ok(IngestOutcome::Duplicate { message_id });
                }
                Ok(IngestOutcome::Accepted { message_id, admission, received_at: now })
            }
            other => {
                info!("[Ingestion] Unknown message type '{}' => ignoring", other);
                Ok(IngestOutcome::Ignored { event_type })
            }
        }
    }
}
