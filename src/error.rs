use crate::domain::Decimal;
use crate::ledger::LedgerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Insufficient balance: {balance} available")]
    InsufficientBalance { balance: Decimal },
    /// The payment processor failed; the caller may retry.
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::InvalidAmount(_) | LedgerError::PayoutDestinationMissing => {
                AppError::BadRequest(message)
            }
            LedgerError::NotOwner
            | LedgerError::NotOrganizer
            | LedgerError::NotGroupAdmin
            | LedgerError::NotGroupMember => AppError::Forbidden(message),
            LedgerError::NotFound(what) => AppError::NotFound(what),
            LedgerError::AlreadySettled
            | LedgerError::NotManualSettlement
            | LedgerError::PayoutInFlight => AppError::Conflict(message),
            LedgerError::InsufficientBalance { balance } => AppError::InsufficientBalance { balance },
            LedgerError::TransferInitiationFailed(_) | LedgerError::CheckoutFailed(_) => {
                AppError::Upstream(message)
            }
            LedgerError::ConcurrentModification
            | LedgerError::Directory(_)
            | LedgerError::Db(_) => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::InsufficientBalance { balance } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "insufficient pool balance",
                    "balance": balance.to_canonical_string(),
                }),
            ),
            AppError::Upstream(msg) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": msg, "retryable": true }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: LedgerError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_ledger_error_status_mapping() {
        assert_eq!(status_of(LedgerError::InvalidAmount("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(LedgerError::PayoutDestinationMissing), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(LedgerError::NotOwner), StatusCode::FORBIDDEN);
        assert_eq!(status_of(LedgerError::NotGroupMember), StatusCode::FORBIDDEN);
        assert_eq!(status_of(LedgerError::NotFound("event".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(LedgerError::PayoutInFlight), StatusCode::CONFLICT);
        assert_eq!(
            status_of(LedgerError::InsufficientBalance {
                balance: Decimal::zero()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LedgerError::TransferInitiationFailed("down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status_of(LedgerError::ConcurrentModification), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
