//! Payout request: one withdrawal from an event's pool.

use crate::domain::contribution::StatusParseError;
use crate::domain::{Decimal, EventId, MemberId, PayoutId, TimeMs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payout lifecycle.
///
/// `pending -> in_transit -> paid`, or `pending | in_transit -> failed`.
/// `pending -> paid` is allowed because the processor may never deliver the
/// creation notice. `paid` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    InTransit,
    Paid,
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "pending",
            PayoutStatus::InTransit => "in_transit",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Failed => "failed",
        }
    }

    /// Holds reserved funds and blocks a second payout for the same event.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, PayoutStatus::Pending | PayoutStatus::InTransit)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Paid | PayoutStatus::Failed)
    }

    pub fn can_transition_to(&self, next: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!(
            (self, next),
            (Pending, InTransit) | (Pending, Paid) | (Pending, Failed) | (InTransit, Paid)
                | (InTransit, Failed)
        )
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PayoutStatus::Pending),
            "in_transit" => Ok(PayoutStatus::InTransit),
            "paid" => Ok(PayoutStatus::Paid),
            "failed" => Ok(PayoutStatus::Failed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: PayoutId,
    pub event_id: EventId,
    pub organizer_id: MemberId,
    pub amount: Decimal,
    pub status: PayoutStatus,
    pub transfer_ref: Option<String>,
    pub requested_ms: TimeMs,
    pub expected_ms: Option<TimeMs>,
    pub arrived_ms: Option<TimeMs>,
    pub failure_reason: Option<String>,
}

impl PayoutRequest {
    pub fn pending(event_id: EventId, organizer_id: MemberId, amount: Decimal) -> Self {
        Self {
            id: PayoutId::generate(),
            event_id,
            organizer_id,
            amount,
            status: PayoutStatus::Pending,
            transfer_ref: None,
            requested_ms: TimeMs::now(),
            expected_ms: None,
            arrived_ms: None,
            failure_reason: None,
        }
    }

    /// Amount this request has taken out of the pool.
    pub fn withdrawn_amount(&self) -> Decimal {
        match self.status {
            PayoutStatus::Failed => Decimal::zero(),
            _ => self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PayoutStatus::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(Pending.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Failed));
        assert!(InTransit.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Paid));
    }

    #[test]
    fn nothing_regresses_or_leaves_a_terminal_state() {
        assert!(!InTransit.can_transition_to(Pending));
        for terminal in [Paid, Failed] {
            for next in [Pending, InTransit, Paid, Failed] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn in_flight_and_terminal_partition_statuses() {
        assert!(Pending.is_in_flight() && InTransit.is_in_flight());
        assert!(Paid.is_terminal() && Failed.is_terminal());
        assert!(!Pending.is_terminal() && !Paid.is_in_flight());
    }

    #[test]
    fn status_strings_match_storage() {
        assert_eq!(InTransit.as_str(), "in_transit");
        assert_eq!("in_transit".parse::<PayoutStatus>().unwrap(), InTransit);
        assert_eq!(serde_json::to_string(&InTransit).unwrap(), "\"in_transit\"");
        assert!("in-transit".parse::<PayoutStatus>().is_err());
    }

    #[test]
    fn failed_payout_withdraws_nothing() {
        let mut payout = PayoutRequest::pending(
            EventId::generate(),
            MemberId::new("org"),
            crate::domain::Decimal::from_str_canonical("100").unwrap(),
        );
        assert_eq!(payout.withdrawn_amount(), payout.amount);
        payout.status = Failed;
        assert!(payout.withdrawn_amount().is_zero());
    }
}
