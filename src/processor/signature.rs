//! Webhook signature verification.
//!
//! Header format: `t=<unix seconds>,v1=<hex HMAC-SHA256(secret, "<t>.<body>")>`.
//! Several `v1` entries may be present while the processor rotates secrets;
//! any one matching is enough.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    MissingHeader,
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance ({skew_secs}s)")]
    Expired { skew_secs: u64 },
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify `header` against `body` at time `now_secs`.
pub fn verify_signature(
    secret: &str,
    header: Option<&str>,
    body: &[u8],
    now_secs: i64,
    tolerance_secs: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => candidates.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    // `t` is untrusted until the MAC matches; abs_diff cannot overflow.
    let skew_secs = now_secs.abs_diff(timestamp);
    if skew_secs > u64::try_from(tolerance_secs).unwrap_or(0) {
        return Err(SignatureError::Expired { skew_secs });
    }

    let mac = signed_payload_mac(secret, timestamp, body)?;
    let matched = candidates.iter().any(|candidate| {
        hex::decode(candidate)
            .map(|expected| mac.clone().verify_slice(&expected).is_ok())
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Produce a header value for `body`. Used by tests and local tooling that
/// replays notifications.
pub fn sign(secret: &str, timestamp: i64, body: &[u8]) -> String {
    match signed_payload_mac(secret, timestamp, body) {
        Ok(mac) => format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        ),
        Err(_) => format!("t={}", timestamp),
    }
}

fn signed_payload_mac(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}
