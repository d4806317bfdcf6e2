//! Payment processor abstraction: outbound checkout and transfer calls, and
//! the inbound notification format.

use crate::domain::{ContributionId, Decimal};
use async_trait::async_trait;
use std::fmt;

pub mod http;
pub mod mock;
pub mod notification;
pub mod signature;

pub use http::HttpProcessor;
pub use mock::{MockProcessor, ProcessorCall};
pub use notification::{parse_notification, Notification, NotificationEnvelope, NotificationError};
pub use signature::{verify_signature, SignatureError};

/// A checkout session opened with the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Opaque reference echoed back in `checkout.completed`.
    pub session_ref: String,
    /// Where the payer should be sent to complete the charge.
    pub redirect_url: String,
}

/// Payment processor trait.
///
/// Both calls are synchronous from the caller's point of view. A transfer
/// that is accepted here can still fail later; that outcome arrives as a
/// `transfer.failed` notification.
#[async_trait]
pub trait PaymentProcessor: Send + Sync + fmt::Debug {
    /// Begin an external charge of `amount` for a contribution.
    async fn create_checkout_session(
        &self,
        contribution_id: &ContributionId,
        amount: Decimal,
        payer_contact: Option<&str>,
    ) -> Result<CheckoutSession, ProcessorError>;

    /// Begin moving `amount` to `destination_account_id`.
    ///
    /// `correlation_key` is echoed back in transfer notifications and is also
    /// sent as the idempotency key. Returns the processor's transfer reference.
    async fn create_transfer(
        &self,
        destination_account_id: &str,
        amount: Decimal,
        correlation_key: &str,
    ) -> Result<String, ProcessorError>;
}

/// Error type for processor calls.
#[derive(Debug, Clone)]
pub enum ProcessorError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 400 validation, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded
    RateLimited,
    /// The processor refused the request
    Rejected(String),
}

impl fmt::Display for ProcessorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessorError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ProcessorError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            ProcessorError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ProcessorError::RateLimited => write!(f, "Rate limited"),
            ProcessorError::Rejected(msg) => write!(f, "Rejected: {}", msg),
        }
    }
}

impl std::error::Error for ProcessorError {}
