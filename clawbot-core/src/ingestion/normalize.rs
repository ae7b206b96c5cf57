//! Maps platform payloads onto the single admission shape the game understands.

use serde::de::DeserializeOwned;
use tracing::info;

use clawbot_common::models::{Admission, AdmissionRequest};

use crate::Error;
use super::events::{
    ChannelCheer, ChannelPointsCustomRewardRedemption, ChannelSubscriptionMessage,
    CHANNEL_CHEER, CHANNEL_POINTS_REDEMPTION_ADD, CHANNEL_SUBSCRIPTION_MESSAGE,
};

/// Deserializes `payload`, reporting the JSON path of the first bad field.
pub fn parse_payload<T: DeserializeOwned>(payload: &serde_json::Value) -> Result<T, Error> {
    serde_path_to_error::deserialize(payload).map_err(|e| Error::Payload {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

/// Turns one notification into an [`Admission`].
///
/// Unknown event types and anonymous cheers give `Ok(None)`; a known type
/// whose payload does not parse is an `Error::Payload`.
pub fn normalize(event_type: &str, payload: &serde_json::Value) -> Result<Option<Admission>, Error> {
    match event_type {
        CHANNEL_POINTS_REDEMPTION_ADD => {
            let ev: ChannelPointsCustomRewardRedemption = parse_payload(payload)?;
            info!("[Ingestion] Channel points: {} redeemed '{}'", ev.user_name, ev.reward.title);
            Ok(Some(Admission::Play(AdmissionRequest {
                user_id: ev.user_id,
                username: ev.user_name,
                base_priority: 0,
                cost: ev.reward.cost,
                input: ev.user_input,
                redemption_id: ev.id,
                reward_title: ev.reward.title,
            })))
        }
        CHANNEL_CHEER => {
            let ev: ChannelCheer = parse_payload(payload)?;
            match (ev.is_anonymous, ev.user_id, ev.user_name) {
                (false, Some(user_id), Some(user_name)) => {
                    info!("[Ingestion] Cheer: {} sent {} bits", user_name, ev.bits);
                    Ok(Some(Admission::Bits {
                        user_id,
                        username: user_name,
                        bits: ev.bits,
                        message: ev.message,
                    }))
                }
                _ => {
                    info!("[Ingestion] Anonymous cheer of {} bits => nobody to credit", ev.bits);
                    Ok(None)
                }
            }
        }
        CHANNEL_SUBSCRIPTION_MESSAGE => {
            let ev: ChannelSubscriptionMessage = parse_payload(payload)?;
            info!("[Ingestion] Subscription: {} (tier {})", ev.user_name, ev.tier);
            Ok(Some(Admission::Subscription {
                user_id: ev.user_id,
                username: ev.user_name,
                tier: ev.tier,
                cumulative_months: ev.cumulative_months,
            }))
        }
        other => {
            info!("[Ingestion] Ignoring unsupported event type '{}'", other);
            Ok(None)
        }
    }
}
