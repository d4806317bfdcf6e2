//! Inbound processor notifications.
//!
//! Wire shape:
//!
//! ```json
//! { "id": "evt_1", "type": "transfer.failed",
//!   "data": { "correlation_key": "…", "reason": "account_closed" } }
//! ```
//!
//! Amounts are decimal strings. Correlation keys and session references are
//! kept as untrusted strings here; resolving them is the reconciler's job.

use crate::domain::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

/// A verified notification body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEnvelope {
    /// Processor-assigned event id, used only for logging.
    pub id: String,
    pub notification: Notification,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    CheckoutCompleted {
        session_ref: String,
        amount: Decimal,
        /// Contribution id the checkout was opened for, if echoed back.
        contribution_id: Option<String>,
    },
    CheckoutExpired {
        session_ref: String,
    },
    TransferCreated {
        correlation_key: String,
        transfer_ref: String,
        expected_arrival_ms: Option<i64>,
    },
    TransferPaid {
        correlation_key: String,
        arrived_ms: Option<i64>,
    },
    TransferFailed {
        correlation_key: String,
        reason: String,
    },
    /// A type this service does not act on.
    Other {
        kind: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &str {
        match self {
            Notification::CheckoutCompleted { .. } => "checkout.completed",
            Notification::CheckoutExpired { .. } => "checkout.expired",
            Notification::TransferCreated { .. } => "transfer.created",
            Notification::TransferPaid { .. } => "transfer.paid",
            Notification::TransferFailed { .. } => "transfer.failed",
            Notification::Other { kind } => kind,
        }
    }
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("malformed notification body: {0}")]
    Malformed(String),
    #[error("invalid {kind} payload: {message}")]
    InvalidPayload { kind: String, message: String },
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct CheckoutCompletedData {
    session_ref: String,
    amount: String,
    #[serde(default)]
    contribution_id: Option<String>,
}

#[derive(Deserialize)]
struct CheckoutExpiredData {
    session_ref: String,
}

#[derive(Deserialize)]
struct TransferCreatedData {
    correlation_key: String,
    transfer_ref: String,
    #[serde(default)]
    expected_arrival_ms: Option<i64>,
}

#[derive(Deserialize)]
struct TransferPaidData {
    correlation_key: String,
    #[serde(default)]
    arrived_ms: Option<i64>,
}

#[derive(Deserialize)]
struct TransferFailedData {
    correlation_key: String,
    #[serde(default)]
    reason: Option<String>,
}

fn data<T: serde::de::DeserializeOwned>(
    kind: &str,
    value: serde_json::Value,
) -> Result<T, NotificationError> {
    serde_json::from_value(value).map_err(|e| NotificationError::InvalidPayload {
        kind: kind.to_string(),
        message: e.to_string(),
    })
}

/// Parse a raw (already signature-checked) notification body.
///
/// Unknown types parse to `Notification::Other`; only malformed envelopes
/// and malformed payloads of known types are errors.
pub fn parse_notification(body: &[u8]) -> Result<NotificationEnvelope, NotificationError> {
    let raw: RawEnvelope =
        serde_json::from_slice(body).map_err(|e| NotificationError::Malformed(e.to_string()))?;
    let kind = raw.kind.as_str();

    let notification = match kind {
        "checkout.completed" => {
            let d: CheckoutCompletedData = data(kind, raw.data)?;
            let amount = Decimal::from_str(&d.amount).map_err(|e| {
                NotificationError::InvalidPayload {
                    kind: kind.to_string(),
                    message: format!("amount {:?}: {}", d.amount, e),
                }
            })?;
            if !amount.is_within_amount_bounds() {
                return Err(NotificationError::InvalidPayload {
                    kind: kind.to_string(),
                    message: format!("amount {:?} out of range", d.amount),
                });
            }
            Notification::CheckoutCompleted {
                session_ref: d.session_ref,
                amount,
                contribution_id: d.contribution_id,
            }
        }
        "checkout.expired" => {
            let d: CheckoutExpiredData = data(kind, raw.data)?;
            Notification::CheckoutExpired {
                session_ref: d.session_ref,
            }
        }
        "transfer.created" => {
            let d: TransferCreatedData = data(kind, raw.data)?;
            Notification::TransferCreated {
                correlation_key: d.correlation_key,
                transfer_ref: d.transfer_ref,
                expected_arrival_ms: d.expected_arrival_ms,
            }
        }
        "transfer.paid" => {
            let d: TransferPaidData = data(kind, raw.data)?;
            Notification::TransferPaid {
                correlation_key: d.correlation_key,
                arrived_ms: d.arrived_ms,
            }
        }
        "transfer.failed" => {
            let d: TransferFailedData = data(kind, raw.data)?;
            Notification::TransferFailed {
                correlation_key: d.correlation_key,
                reason: d.reason.unwrap_or_else(|| "unspecified".to_string()),
            }
        }
        other => Notification::Other {
            kind: other.to_string(),
        },
    };

    Ok(NotificationEnvelope {
        id: raw.id,
        notification,
    })
}
