use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::warn;

use crate::api::AppState;
use crate::error::AppError;
use crate::ledger::SettlementOutcome;
use crate::processor::{parse_notification, verify_signature};

pub const SIGNATURE_HEADER: &str = "x-processor-signature";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

/// Processor notification endpoint.
///
/// Bad signatures are rejected with 400. A verified notification is always
/// acknowledged, even when it cannot be applied; only a storage failure
/// returns 500 so the processor redelivers.
pub async fn processor_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    verify_signature(
        &state.config.webhook_secret,
        signature,
        &body,
        chrono::Utc::now().timestamp(),
        state.config.webhook_tolerance_secs,
    )
    .map_err(|e| {
        warn!(error = %e, "Rejected processor notification");
        AppError::BadRequest(e.to_string())
    })?;

    let envelope = match parse_notification(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Unusable processor notification");
            return Ok(Json(WebhookAck {
                received: true,
                outcome: SettlementOutcome::Unresolvable(e.to_string()).as_str(),
            }));
        }
    };

    let outcome = state
        .reconciler
        .reconcile(&envelope)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(WebhookAck {
        received: true,
        outcome: outcome.as_str(),
    }))
}
