//! Contribution ledger: one row per (event, member), settled either by the
//! processor or by a group admin.
//!
//! Every settlement credits the pool by the amount it adds to the row. A
//! manual override remembers its exact delta, so an undo can take the same
//! amount back out of both the row and the pool.

use crate::db::Repository;
use crate::directory::Directory;
use crate::domain::{Contribution, ContributionId, Decimal, EventId, MemberId, PaymentEvent, Settlement, TimeMs};
use crate::processor::PaymentProcessor;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{authorize_reader, require_positive, LedgerError, PoolTx, SettlementOutcome};

/// Result of opening a checkout for a contribution.
#[derive(Debug, Clone)]
pub struct CheckoutStarted {
    pub contribution: Contribution,
    pub redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct ContributionLedger {
    repo: Arc<Repository>,
    directory: Arc<dyn Directory>,
    processor: Arc<dyn PaymentProcessor>,
}

impl ContributionLedger {
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

    /// Make sure every current group member has a row, then return all rows.
    ///
    /// Members removed from the group keep their rows; members who joined
    /// since the last call get a fresh PENDING row.
    pub async fn ensure_contributions(
        &self,
        event_id: &EventId,
    ) -> Result<Vec<Contribution>, LedgerError> {
        let event = self.load_event(event_id).await?;
        self.sync_members(&event).await?;
        Ok(self.repo.list_contributions(event_id).await?)
    }

    /// Reader-facing variant of `ensure_contributions`.
    pub async fn list_contributions(
        &self,
        event_id: &EventId,
        actor: &MemberId,
    ) -> Result<Vec<Contribution>, LedgerError> {
        let event = self.load_event(event_id).await?;
        authorize_reader(self.directory.as_ref(), &event, actor).await?;
        self.ensure_contributions(event_id).await
    }

    async fn sync_members(&self, event: &PaymentEvent) -> Result<u64, LedgerError> {
        let members = self.directory.list_members(&event.group_id).await?;
        let created = self.repo.ensure_contributions(&event.id, &members).await?;
        if created > 0 {
            debug!(event_id = %event.id, created, "Created contribution rows");
        }
        Ok(created)
    }

    /// Open a processor checkout for the actor's own contribution.
    ///
    /// The pool is not touched here; it is credited when the processor
    /// confirms the charge.
    pub async fn begin_external_settlement(
        &self,
        id: &ContributionId,
        amount: Decimal,
        actor: &MemberId,
    ) -> Result<CheckoutStarted, LedgerError> {
        let contribution = self.load_contribution(id).await?;
        if &contribution.member_id != actor {
            return Err(LedgerError::NotOwner);
        }
        if contribution.is_paid() {
            return Err(LedgerError::AlreadySettled);
        }
        let amount = require_positive(amount)?;

        let contact = self.directory.contact_email(actor).await?;
        let session = self
            .processor
            .create_checkout_session(id, amount, contact.as_deref())
            .await
            .map_err(|e| LedgerError::CheckoutFailed(e.to_string()))?;

        if !self.repo.set_checkout_session(id, &session.session_ref).await? {
            return Err(LedgerError::AlreadySettled);
        }

        info!(
            contribution_id = %id,
            session_ref = %session.session_ref,
            amount = %amount,
            "Checkout session opened"
        );

        Ok(CheckoutStarted {
            contribution: self.load_contribution(id).await?,
            redirect_url: session.redirect_url,
        })
    }

    /// Apply a confirmed processor charge: mark the row PAID and credit the
    /// pool in one transaction. A row that is already PAID is a duplicate.
    ///
    /// The row is found by `session_ref`. A member who opened a second
    /// checkout no longer holds the first session, so a charge confirmed on
    /// the older session falls back to the `contribution_id` the processor
    /// echoes from the checkout metadata.
    pub async fn apply_external_settlement(
        &self,
        session_ref: &str,
        amount: Decimal,
        contribution_id: Option<&str>,
    ) -> Result<SettlementOutcome, LedgerError> {
        if !amount.is_positive() {
            return Ok(SettlementOutcome::Unresolvable(format!(
                "non-positive settlement amount {}",
                amount
            )));
        }

        let Some(found) = self.find_settled_row(session_ref, contribution_id).await? else {
            return Ok(SettlementOutcome::Unresolvable(format!(
                "no contribution holds session {}",
                session_ref
            )));
        };
        if found.is_paid() {
            return Ok(SettlementOutcome::Duplicate);
        }

        let mut pool = match PoolTx::begin(&self.repo, &found.event_id).await {
            Ok(pool) => pool,
            Err(LedgerError::NotFound(what)) => return Ok(SettlementOutcome::Unresolvable(what)),
            Err(e) => return Err(e),
        };

        let Some(current) = Repository::fetch_contribution(pool.conn(), &found.id).await? else {
            return Ok(SettlementOutcome::Unresolvable(format!("contribution {}", found.id)));
        };
        if current.is_paid() {
            return Ok(SettlementOutcome::Duplicate);
        }

        let Some(settled) = current.amount_settled.checked_add(amount) else {
            return Ok(SettlementOutcome::Unresolvable(format!(
                "settlement {} overflows contribution {}",
                amount, current.id
            )));
        };
        let marked = Repository::mark_processor_settled(
            pool.conn(),
            &current.id,
            settled,
            session_ref,
            TimeMs::now(),
        )
        .await?;
        if !marked {
            return Ok(SettlementOutcome::Duplicate);
        }

        let balance = match pool.credit(amount).await {
            Ok(balance) => balance,
            Err(LedgerError::InvalidAmount(reason)) => {
                return Ok(SettlementOutcome::Unresolvable(reason))
            }
            Err(e) => return Err(e),
        };
        pool.commit().await?;

        info!(
            contribution_id = %current.id,
            event_id = %current.event_id,
            amount = %amount,
            balance = %balance,
            "Contribution settled by processor"
        );
        Ok(SettlementOutcome::Applied)
    }

    async fn find_settled_row(
        &self,
        session_ref: &str,
        contribution_id: Option<&str>,
    ) -> Result<Option<Contribution>, LedgerError> {
        if let Some(found) = self.repo.find_contribution_by_session(session_ref).await? {
            return Ok(Some(found));
        }
        let Some(id) = contribution_id.and_then(|raw| raw.parse::<ContributionId>().ok()) else {
            return Ok(None);
        };
        let found = self.repo.get_contribution(&id).await?;
        if found.is_some() {
            debug!(
                session_ref = %session_ref,
                contribution_id = %id,
                "Settlement on a superseded checkout session"
            );
        }
        Ok(found)
    }

    /// An abandoned checkout: the PENDING row holding `session_ref` becomes FAILED.
    pub async fn expire_external_settlement(
        &self,
        session_ref: &str,
    ) -> Result<SettlementOutcome, LedgerError> {
        if self.repo.expire_checkout_session(session_ref).await? {
            info!(session_ref = %session_ref, "Checkout session expired");
            return Ok(SettlementOutcome::Applied);
        }
        match self.repo.find_contribution_by_session(session_ref).await? {
            Some(_) => Ok(SettlementOutcome::Duplicate),
            None => Ok(SettlementOutcome::Unresolvable(format!(
                "no contribution holds session {}",
                session_ref
            ))),
        }
    }

    /// Record that a member paid outside the processor, crediting the pool
    /// by `amount`.
    ///
    /// Only a row that is not PAID can be settled manually; a PAID row is
    /// `AlreadySettled`, whichever way it was settled.
    pub async fn apply_manual_settlement(
        &self,
        id: &ContributionId,
        amount: Decimal,
        actor: &MemberId,
    ) -> Result<Contribution, LedgerError> {
        let contribution = self.load_contribution(id).await?;
        let event = self.load_event(&contribution.event_id).await?;
        self.require_admin(&event, actor).await?;
        let amount = require_positive(amount)?;

        let mut pool = PoolTx::begin(&self.repo, &event.id).await?;
        let current = Repository::fetch_contribution(pool.conn(), id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("contribution {}", id)))?;
        if current.is_paid() {
            return Err(LedgerError::AlreadySettled);
        }

        let settled = current.amount_settled.checked_add(amount).ok_or_else(|| {
            LedgerError::InvalidAmount(format!("settlement {} overflows contribution {}", amount, id))
        })?;
        let marked =
            Repository::mark_manual_settled(pool.conn(), id, settled, amount, TimeMs::now()).await?;
        if !marked {
            return Err(LedgerError::AlreadySettled);
        }
        let balance = pool.credit(amount).await?;
        pool.commit().await?;

        info!(
            contribution_id = %id,
            actor = %actor,
            amount = %amount,
            balance = %balance,
            "Manual settlement recorded"
        );
        self.load_contribution(id).await
    }

    /// Reverse a manual settlement, taking exactly the recorded delta back
    /// out of the row and the pool.
    ///
    /// Fails with `InsufficientBalance` once the delta has been paid out.
    pub async fn undo_manual_settlement(
        &self,
        id: &ContributionId,
        actor: &MemberId,
    ) -> Result<Contribution, LedgerError> {
        let contribution = self.load_contribution(id).await?;
        let event = self.load_event(&contribution.event_id).await?;
        self.require_admin(&event, actor).await?;

        let mut pool = PoolTx::begin(&self.repo, &event.id).await?;
        let current = Repository::fetch_contribution(pool.conn(), id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("contribution {}", id)))?;

        let delta = match (&current.settlement, current.is_paid()) {
            (Some(Settlement::Manual { delta }), true) => *delta,
            _ => return Err(LedgerError::NotManualSettlement),
        };

        let remaining = current.amount_settled.saturating_sub(delta);
        if !Repository::clear_manual_settlement(pool.conn(), id, remaining).await? {
            return Err(LedgerError::NotManualSettlement);
        }
        let balance = pool.reserve(delta).await?;
        pool.commit().await?;

        warn!(
            contribution_id = %id,
            actor = %actor,
            delta = %delta,
            balance = %balance,
            "Manual settlement undone"
        );
        self.load_contribution(id).await
    }

    async fn require_admin(&self, event: &PaymentEvent, actor: &MemberId) -> Result<(), LedgerError> {
        if self.directory.is_group_admin(&event.group_id, actor).await? {
            Ok(())
        } else {
            Err(LedgerError::NotGroupAdmin)
        }
    }

    async fn load_event(&self, id: &EventId) -> Result<PaymentEvent, LedgerError> {
        self.repo
            .get_event(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("event {}", id)))
    }

    async fn load_contribution(&self, id: &ContributionId) -> Result<Contribution, LedgerError> {
        self.repo
            .get_contribution(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("contribution {}", id)))
    }
}
