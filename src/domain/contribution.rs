//! Contribution: one member's obligation against a payment event.

use crate::domain::{ContributionId, Decimal, EventId, MemberId, TimeMs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionStatus {
    Pending,
    Paid,
    /// The last checkout session expired without payment.
    Failed,
}

impl ContributionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionStatus::Pending => "pending",
            ContributionStatus::Paid => "paid",
            ContributionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ContributionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown status strings read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct StatusParseError(pub String);

impl FromStr for ContributionStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ContributionStatus::Pending),
            "paid" => Ok(ContributionStatus::Paid),
            "failed" => Ok(ContributionStatus::Failed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

/// How a contribution became PAID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Settlement {
    /// Settled by the payment processor.
    Processor { reference: String },
    /// Recorded by a group admin. `delta` is exactly what the override added
    /// to `amount_settled`, so an undo can subtract it.
    Manual { delta: Decimal },
}

impl Settlement {
    pub fn method(&self) -> &'static str {
        match self {
            Settlement::Processor { .. } => "processor",
            Settlement::Manual { .. } => "manual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ContributionId,
    pub event_id: EventId,
    pub member_id: MemberId,
    /// Cumulative amount settled against this obligation.
    pub amount_settled: Decimal,
    pub status: ContributionStatus,
    pub settlement: Option<Settlement>,
    /// Opaque checkout session reference from the processor.
    pub session_ref: Option<String>,
    pub settled_ms: Option<TimeMs>,
}

impl Contribution {
    /// The row `ensure_contributions` creates for a member.
    pub fn pending(event_id: EventId, member_id: MemberId) -> Self {
        Self {
            id: ContributionId::generate(),
            event_id,
            member_id,
            amount_settled: Decimal::zero(),
            status: ContributionStatus::Pending,
            settlement: None,
            session_ref: None,
            settled_ms: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == ContributionStatus::Paid
    }

    /// Amount this row contributed to the pool balance: everything settled
    /// on a PAID row, by either method.
    pub fn pooled_amount(&self) -> Decimal {
        if self.is_paid() {
            self.amount_settled
        } else {
            Decimal::zero()
        }
    }

    /// Amount recorded by a manual override, if that is how the row is PAID.
    pub fn manual_amount(&self) -> Decimal {
        match &self.settlement {
            Some(Settlement::Manual { .. }) if self.is_paid() => self.amount_settled,
            _ => Decimal::zero(),
        }
    }
}
