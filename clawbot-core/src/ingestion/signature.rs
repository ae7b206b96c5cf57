//! Webhook signature verification (HMAC-SHA256, constant-time compare).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::Error;
use crate::config::SignatureScheme;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "sha256=";

fn compute(message: &[u8], secret: &str) -> Result<Vec<u8>, Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Signature(format!("invalid HMAC key: {}", e)))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Produces the header value (`sha256=<hex>`) for `message`.
pub fn sign(message: &[u8], secret: &str) -> Result<String, Error> {
    Ok(format!("{}{}", SIGNATURE_PREFIX, hex::encode(compute(message, secret)?)))
}

/// Checks `signature_header` against the HMAC of `raw_body`.
///
/// Any malformed header, empty secret or mismatch yields `false`. The byte
/// comparison runs in constant time.
pub fn verify(raw_body: &[u8], signature_header: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    let provided = signature_header.trim();
    let provided = provided.strip_prefix(SIGNATURE_PREFIX).unwrap_or(provided);
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };
    let Ok(expected) = compute(raw_body, secret) else {
        return false;
    };
    constant_time_eq::constant_time_eq(&expected, &provided)
}

/// The bytes that are signed under `scheme`.
pub fn signed_message(
    scheme: SignatureScheme,
    message_id: &str,
    timestamp: &str,
    raw_body: &[u8],
) -> Vec<u8> {
    match scheme {
        SignatureScheme::RawBody => raw_body.to_vec(),
        SignatureScheme::TwitchEventSub => {
            let mut buf = Vec::with_capacity(message_id.len() + timestamp.len() + raw_body.len());
            buf.extend_from_slice(message_id.as_bytes());
            buf.extend_from_slice(timestamp.as_bytes());
            buf.extend_from_slice(raw_body);
            buf
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "s3cr3t-webhook-key";

    #[test]
    fn accepts_untouched_body() {
        let body = br#"{"event":{"user_id":"1"}}"#;
        let header = sign(body, SECRET).unwrap();
        assert!(header.starts_with(SIGNATURE_PREFIX));
        assert!(verify(body, &header, SECRET));
    }

    #[test]
    fn accepts_bare_hex_without_prefix() {
        let body = b"hello";
        let header = sign(body, SECRET).unwrap();
        let bare = header.trim_start_matches(SIGNATURE_PREFIX);
        assert!(verify(body, bare, SECRET));
    }

    #[test]
    fn rejects_altered_body() {
        let body = br#"{"bits":100}"#.to_vec();
        let header = sign(&body, SECRET).unwrap();
        for i in 0..body.len() {
            let mut tampered = body.clone();
            tampered[i] ^= 0x01;
            assert!(!verify(&tampered, &header, SECRET), "flip at byte {} slipped through", i);
        }
        let mut extended = body.clone();
        extended.push(b' ');
        assert!(!verify(&extended, &header, SECRET));
    }

    #[test]
    fn rejects_wrong_secret_and_garbage_headers() {
        let body = b"payload";
        let header = sign(body, SECRET).unwrap();
        assert!(!verify(body, &header, "other-secret"));
        assert!(!verify(body, "sha256=nothex", SECRET));
        assert!(!verify(body, "sha256=abcd", SECRET));
        assert!(!verify(body, "", SECRET));
        assert!(!verify(body, &header, ""));
    }

    #[test]
    fn twitch_scheme_prefixes_id_and_timestamp() {
        let msg = signed_message(SignatureScheme::TwitchEventSub, "id-1", "2025-01-01T00:00:00Z", b"{}");
        assert_eq!(msg, b"id-12025-01-01T00:00:00Z{}".to_vec());
        let raw = signed_message(SignatureScheme::RawBody, "id-1", "ts", b"{}");
        assert_eq!(raw, b"{}".to_vec());
    }
}
