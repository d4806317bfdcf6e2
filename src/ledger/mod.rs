//! Pool ledger and payout reconciliation.
//!
//! - `accumulator` - the per-event pool balance, mutated only inside a locked transaction
//! - `contributions` - one contribution row per member, settlement and manual override
//! - `payouts` - reserving funds and driving transfers to the organizer
//! - `reconciler` - applying processor notifications idempotently
//! - `events` - scheduling events and reading their summaries

pub mod accumulator;
pub mod contributions;
pub mod events;
pub mod payouts;
pub mod reconciler;

pub use accumulator::PoolTx;
pub use contributions::{CheckoutStarted, ContributionLedger};
pub use events::EventRegistry;
pub use payouts::{PayoutListing, PayoutManager};
pub use reconciler::SettlementReconciler;

use crate::directory::{Directory, DirectoryError};
use crate::domain::{Decimal, MemberId, PaymentEvent};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("only the contributing member can do this")]
    NotOwner,
    #[error("only the event organizer can do this")]
    NotOrganizer,
    #[error("only a group admin can do this")]
    NotGroupAdmin,
    #[error("not a member of this group")]
    NotGroupMember,
    #[error("contribution is already settled")]
    AlreadySettled,
    #[error("contribution was not settled manually")]
    NotManualSettlement,
    #[error("no verified payout destination on file")]
    PayoutDestinationMissing,
    #[error("insufficient pool balance ({balance} available)")]
    InsufficientBalance { balance: Decimal },
    #[error("a payout for this event is already in progress")]
    PayoutInFlight,
    #[error("transfer could not be initiated: {0}")]
    TransferInitiationFailed(String),
    #[error("checkout could not be started: {0}")]
    CheckoutFailed(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("pool balance changed under the lock")]
    ConcurrentModification,
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// How a notification (or a notification-driven transition) landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// State changed.
    Applied,
    /// Already in the target state; nothing changed.
    Duplicate,
    /// The referenced entity is unknown or the payload is unusable.
    Unresolvable(String),
    /// A notification type this service does not act on.
    Ignored,
}

impl SettlementOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettlementOutcome::Applied => "applied",
            SettlementOutcome::Duplicate => "duplicate",
            SettlementOutcome::Unresolvable(_) => "unresolvable",
            SettlementOutcome::Ignored => "ignored",
        }
    }
}

fn require_positive(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount.is_positive() {
        Ok(amount)
    } else {
        Err(LedgerError::InvalidAmount(format!(
            "amount must be greater than zero, got {}",
            amount
        )))
    }
}

/// Anyone in the group (or the organizer) may read an event's ledger.
async fn authorize_reader(
    directory: &dyn Directory,
    event: &PaymentEvent,
    actor: &MemberId,
) -> Result<(), LedgerError> {
    if event.is_organizer(actor) {
        return Ok(());
    }
    let members = directory.list_members(&event.group_id).await?;
    if members.contains(actor) || directory.is_group_admin(&event.group_id, actor).await? {
        return Ok(());
    }
    Err(LedgerError::NotGroupMember)
}
