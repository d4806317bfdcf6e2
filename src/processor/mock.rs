//! Mock processor for testing without network calls.

use super::{CheckoutSession, PaymentProcessor, ProcessorError};
use crate::domain::{ContributionId, Decimal};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// A call the mock received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorCall {
    Checkout {
        contribution_id: ContributionId,
        amount: Decimal,
        payer_contact: Option<String>,
    },
    Transfer {
        destination: String,
        amount: Decimal,
        correlation_key: String,
    },
}

/// Mock processor that hands out sequential references and records calls.
#[derive(Debug, Default)]
pub struct MockProcessor {
    calls: Mutex<Vec<ProcessorCall>>,
    counter: AtomicU64,
    fail_checkouts: AtomicBool,
    fail_transfers: AtomicBool,
}

impl MockProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every transfer synchronously.
    pub fn with_failing_transfers(self) -> Self {
        self.fail_transfers.store(true, Ordering::SeqCst);
        self
    }

    /// Reject every checkout session request.
    pub fn with_failing_checkouts(self) -> Self {
        self.fail_checkouts.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every call received so far.
    pub fn calls(&self) -> Vec<ProcessorCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn transfer_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProcessorCall::Transfer { .. }))
            .count()
    }

    fn record(&self, call: ProcessorCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn next_seq(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl PaymentProcessor for MockProcessor {
    async fn create_checkout_session(
        &self,
        contribution_id: &ContributionId,
        amount: Decimal,
        payer_contact: Option<&str>,
    ) -> Result<CheckoutSession, ProcessorError> {
        self.record(ProcessorCall::Checkout {
            contribution_id: *contribution_id,
            amount,
            payer_contact: payer_contact.map(str::to_string),
        });

        if self.fail_checkouts.load(Ordering::SeqCst) {
            return Err(ProcessorError::Rejected("checkout disabled".to_string()));
        }

        let session_ref = format!("cs_mock_{}", self.next_seq());
        Ok(CheckoutSession {
            redirect_url: format!("https://checkout.invalid/{}", session_ref),
            session_ref,
        })
    }

    async fn create_transfer(
        &self,
        destination_account_id: &str,
        amount: Decimal,
        correlation_key: &str,
    ) -> Result<String, ProcessorError> {
        self.record(ProcessorCall::Transfer {
            destination: destination_account_id.to_string(),
            amount,
            correlation_key: correlation_key.to_string(),
        });

        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(ProcessorError::HttpError {
                status: 400,
                message: "destination account cannot receive transfers".to_string(),
            });
        }

        Ok(format!("tr_mock_{}", self.next_seq()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[tokio::test]
    async fn test_mock_checkout_hands_out_distinct_sessions() {
        let mock = MockProcessor::new();
        let id = ContributionId::generate();

        let a = mock
            .create_checkout_session(&id, dec("50"), Some("a@example.com"))
            .await
            .unwrap();
        let b = mock.create_checkout_session(&id, dec("50"), None).await.unwrap();

        assert_ne!(a.session_ref, b.session_ref);
        assert!(a.redirect_url.ends_with(&a.session_ref));
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_transfer_records_correlation_key() {
        let mock = MockProcessor::new();
        let reference = mock.create_transfer("acct_1", dec("100"), "po-1").await.unwrap();
        assert!(reference.starts_with("tr_mock_"));
        assert_eq!(
            mock.calls(),
            vec![ProcessorCall::Transfer {
                destination: "acct_1".to_string(),
                amount: dec("100"),
                correlation_key: "po-1".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_mock_failing_transfers() {
        let mock = MockProcessor::new().with_failing_transfers();
        assert!(mock.create_transfer("acct_1", dec("1"), "k").await.is_err());

        mock.set_fail_transfers(false);
        assert!(mock.create_transfer("acct_1", dec("1"), "k").await.is_ok());
        assert_eq!(mock.transfer_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_failing_checkouts() {
        let mock = MockProcessor::new().with_failing_checkouts();
        let result = mock
            .create_checkout_session(&ContributionId::generate(), dec("1"), None)
            .await;
        assert!(matches!(result, Err(ProcessorError::Rejected(_))));
    }
}
