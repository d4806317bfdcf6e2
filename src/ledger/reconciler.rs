//! Applies verified processor notifications to the ledger.
//!
//! Every notification may be delivered more than once and in any order.
//! Each handler is guarded by the current row status, so a replay lands as
//! `Duplicate` and never moves money twice.

use crate::domain::{PayoutId, TimeMs};
use crate::processor::{Notification, NotificationEnvelope};
use tracing::{debug, info, warn};

use super::{ContributionLedger, LedgerError, PayoutManager, SettlementOutcome};

#[derive(Debug, Clone)]
pub struct SettlementReconciler {
    contributions: ContributionLedger,
    payouts: PayoutManager,
}

impl SettlementReconciler {
    pub fn new(contributions: ContributionLedger, payouts: PayoutManager) -> Self {
        Self {
            contributions,
            payouts,
        }
    }

    /// Apply one notification.
    ///
    /// # Errors
    /// Only storage failures; the caller should let the processor redeliver.
    pub async fn reconcile(
        &self,
        envelope: &NotificationEnvelope,
    ) -> Result<SettlementOutcome, LedgerError> {
        let outcome = self.dispatch(&envelope.notification).await?;

        match &outcome {
            SettlementOutcome::Applied => info!(
                notification_id = %envelope.id,
                kind = envelope.notification.kind(),
                "Notification applied"
            ),
            SettlementOutcome::Duplicate => debug!(
                notification_id = %envelope.id,
                kind = envelope.notification.kind(),
                "Duplicate notification"
            ),
            SettlementOutcome::Unresolvable(reason) => warn!(
                notification_id = %envelope.id,
                kind = envelope.notification.kind(),
                reason = %reason,
                "Unresolvable notification"
            ),
            SettlementOutcome::Ignored => debug!(
                notification_id = %envelope.id,
                kind = envelope.notification.kind(),
                "Ignoring notification type"
            ),
        }
        Ok(outcome)
    }

    async fn dispatch(&self, notification: &Notification) -> Result<SettlementOutcome, LedgerError> {
        match notification {
            Notification::CheckoutCompleted {
                session_ref,
                amount,
                contribution_id,
            } => {
                self.contributions
                    .apply_external_settlement(session_ref, *amount, contribution_id.as_deref())
                    .await
            }
            Notification::CheckoutExpired { session_ref } => {
                self.contributions.expire_external_settlement(session_ref).await
            }
            Notification::TransferCreated {
                correlation_key,
                transfer_ref,
                expected_arrival_ms,
            } => match parse_correlation_key(correlation_key) {
                Ok(id) => {
                    self.payouts
                        .mark_in_transit(&id, transfer_ref, expected_arrival_ms.map(TimeMs::new))
                        .await
                }
                Err(outcome) => Ok(outcome),
            },
            Notification::TransferPaid {
                correlation_key,
                arrived_ms,
            } => match parse_correlation_key(correlation_key) {
                Ok(id) => {
                    let arrived = arrived_ms.map(TimeMs::new).unwrap_or_else(TimeMs::now);
                    self.payouts.mark_paid(&id, arrived).await
                }
                Err(outcome) => Ok(outcome),
            },
            Notification::TransferFailed {
                correlation_key,
                reason,
            } => match parse_correlation_key(correlation_key) {
                Ok(id) => self.payouts.mark_failed(&id, reason).await,
                Err(outcome) => Ok(outcome),
            },
            Notification::Other { .. } => Ok(SettlementOutcome::Ignored),
        }
    }
}

/// Transfer notifications carry the payout id as their correlation key.
fn parse_correlation_key(key: &str) -> Result<PayoutId, SettlementOutcome> {
    key.parse::<PayoutId>()
        .map_err(|_| SettlementOutcome::Unresolvable(format!("unknown correlation key {}", key)))
}
