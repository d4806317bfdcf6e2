//! Payout manager: moves pooled funds to the organizer.
//!
//! A request reserves the amount and inserts a PENDING payout in one locked
//! transaction, then starts the transfer outside it. If the processor refuses
//! the transfer synchronously, a compensating transaction deletes the payout
//! and credits the amount back. Later outcomes arrive as notifications and
//! are applied through the `mark_*` transitions below.

use crate::db::Repository;
use crate::directory::Directory;
use crate::domain::{Decimal, EventId, MemberId, PaymentEvent, PayoutId, PayoutRequest, PayoutTotals, TimeMs};
use crate::processor::PaymentProcessor;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{authorize_reader, require_positive, LedgerError, PoolTx, SettlementOutcome};

/// Payouts plus their running totals.
#[derive(Debug, Clone)]
pub struct PayoutListing {
    pub payouts: Vec<PayoutRequest>,
    pub totals: PayoutTotals,
}

impl PayoutListing {
    fn new(payouts: Vec<PayoutRequest>) -> Self {
        let totals = PayoutTotals::compute(&payouts);
        Self { payouts, totals }
    }
}

#[derive(Debug, Clone)]
pub struct PayoutManager {
    repo: Arc<Repository>,
    directory: Arc<dyn Directory>,
    processor: Arc<dyn PaymentProcessor>,
}

impl PayoutManager {
    pub fn new(
        repo: Arc<Repository>,
        directory: Arc<dyn Directory>,
        processor: Arc<dyn PaymentProcessor>,
    ) -> Self {
        Self {
            repo,
            directory,
            processor,
        }
    }

    /// Withdraw `amount` (or the whole balance when `None`) to the
    /// organizer's verified destination.
    ///
    /// At most one payout per event may be PENDING or IN_TRANSIT.
    pub async fn request_payout(
        &self,
        event_id: &EventId,
        actor: &MemberId,
        amount: Option<Decimal>,
    ) -> Result<PayoutRequest, LedgerError> {
        let event = self.load_event(event_id).await?;
        if !event.is_organizer(actor) {
            return Err(LedgerError::NotOrganizer);
        }
        let destination = self
            .directory
            .payout_destination(actor)
            .await?
            .ok_or(LedgerError::PayoutDestinationMissing)?;
        let amount = amount.map(require_positive).transpose()?;

        let payout = self.reserve_payout(&event, actor, amount).await?;

        match self
            .processor
            .create_transfer(&destination, payout.amount, &payout.id.to_string())
            .await
        {
            Ok(transfer_ref) => {
                if let Err(e) = self.repo.record_transfer_reference(&payout.id, &transfer_ref).await {
                    warn!(
                        payout_id = %payout.id,
                        transfer_ref = %transfer_ref,
                        error = %e,
                        "Failed to record transfer reference"
                    );
                }
                info!(
                    payout_id = %payout.id,
                    event_id = %event.id,
                    amount = %payout.amount,
                    transfer_ref = %transfer_ref,
                    "Transfer initiated"
                );
                self.load_payout(&payout.id).await
            }
            Err(e) => {
                warn!(
                    payout_id = %payout.id,
                    event_id = %event.id,
                    error = %e,
                    "Transfer rejected, releasing reserved funds"
                );
                self.release_unstarted(&payout).await?;
                Err(LedgerError::TransferInitiationFailed(e.to_string()))
            }
        }
    }

    async fn reserve_payout(
        &self,
        event: &PaymentEvent,
        actor: &MemberId,
        amount: Option<Decimal>,
    ) -> Result<PayoutRequest, LedgerError> {
        let mut pool = PoolTx::begin(&self.repo, &event.id).await?;

        if Repository::find_in_flight_payout(pool.conn(), &event.id)
            .await?
            .is_some()
        {
            return Err(LedgerError::PayoutInFlight);
        }

        // The full-balance default is read under the lock.
        let amount = require_positive(amount.unwrap_or(pool.balance()))?;
        pool.reserve(amount).await?;
        let payout = PayoutRequest::pending(event.id, actor.clone(), amount);
        match Repository::insert_payout(pool.conn(), &payout).await {
            Ok(()) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(LedgerError::PayoutInFlight)
            }
            Err(e) => return Err(e.into()),
        }
        pool.commit().await?;

        Ok(payout)
    }

    /// Undo a reservation whose transfer never started.
    async fn release_unstarted(&self, payout: &PayoutRequest) -> Result<(), LedgerError> {
        let mut pool = PoolTx::begin(&self.repo, &payout.event_id).await?;
        if !Repository::delete_pending_payout(pool.conn(), &payout.id).await? {
            // A notification already moved it; the reconciler owns it now.
            error!(payout_id = %payout.id, "Rejected payout is no longer pending");
            return Ok(());
        }
        pool.credit(payout.amount).await?;
        pool.commit().await
    }

    pub async fn list_payouts_for_event(
        &self,
        event_id: &EventId,
        actor: &MemberId,
    ) -> Result<PayoutListing, LedgerError> {
        let event = self.load_event(event_id).await?;
        authorize_reader(self.directory.as_ref(), &event, actor).await?;
        Ok(PayoutListing::new(self.repo.list_payouts_for_event(event_id).await?))
    }

    /// Organizers can only list their own payouts.
    pub async fn list_payouts_for_organizer(
        &self,
        organizer: &MemberId,
        actor: &MemberId,
    ) -> Result<PayoutListing, LedgerError> {
        if organizer != actor {
            return Err(LedgerError::NotOrganizer);
        }
        Ok(PayoutListing::new(
            self.repo.list_payouts_for_organizer(organizer).await?,
        ))
    }

    /// `pending -> in_transit`, recording the transfer reference and expected arrival.
    pub async fn mark_in_transit(
        &self,
        id: &PayoutId,
        transfer_ref: &str,
        expected: Option<TimeMs>,
    ) -> Result<SettlementOutcome, LedgerError> {
        let mut tx = self.repo.begin().await?;
        let moved =
            Repository::mark_payout_in_transit(&mut *tx, id, Some(transfer_ref), expected).await?;
        tx.commit().await?;

        if moved {
            info!(payout_id = %id, transfer_ref = %transfer_ref, "Payout in transit");
            return Ok(SettlementOutcome::Applied);
        }
        self.unchanged(id).await
    }

    /// `pending | in_transit -> paid`. Funds were already reserved at request time.
    pub async fn mark_paid(
        &self,
        id: &PayoutId,
        arrived: TimeMs,
    ) -> Result<SettlementOutcome, LedgerError> {
        let mut tx = self.repo.begin().await?;
        let moved = Repository::mark_payout_paid(&mut *tx, id, arrived).await?;
        tx.commit().await?;

        if moved {
            info!(payout_id = %id, "Payout paid");
            return Ok(SettlementOutcome::Applied);
        }
        self.unchanged(id).await
    }

    /// `pending | in_transit -> failed`, refunding the amount to the pool once.
    pub async fn mark_failed(
        &self,
        id: &PayoutId,
        reason: &str,
    ) -> Result<SettlementOutcome, LedgerError> {
        let Some(found) = self.repo.get_payout(id).await? else {
            return Ok(SettlementOutcome::Unresolvable(format!("payout {}", id)));
        };
        if !found.status.is_in_flight() {
            return Ok(SettlementOutcome::Duplicate);
        }

        let mut pool = match PoolTx::begin(&self.repo, &found.event_id).await {
            Ok(pool) => pool,
            Err(LedgerError::NotFound(what)) => return Ok(SettlementOutcome::Unresolvable(what)),
            Err(e) => return Err(e),
        };
        if !Repository::mark_payout_failed(pool.conn(), id, reason).await? {
            return Ok(SettlementOutcome::Duplicate);
        }
        let balance = pool.credit(found.amount).await?;
        pool.commit().await?;

        warn!(
            payout_id = %id,
            event_id = %found.event_id,
            amount = %found.amount,
            balance = %balance,
            reason = %reason,
            "Payout failed, amount returned to pool"
        );
        Ok(SettlementOutcome::Applied)
    }

    async fn unchanged(&self, id: &PayoutId) -> Result<SettlementOutcome, LedgerError> {
        match self.repo.get_payout(id).await? {
            Some(_) => Ok(SettlementOutcome::Duplicate),
            None => Ok(SettlementOutcome::Unresolvable(format!("payout {}", id))),
        }
    }

    async fn load_event(&self, id: &EventId) -> Result<PaymentEvent, LedgerError> {
        self.repo
            .get_event(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("event {}", id)))
    }

    async fn load_payout(&self, id: &PayoutId) -> Result<PayoutRequest, LedgerError> {
        self.repo
            .get_payout(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("payout {}", id)))
    }
}
