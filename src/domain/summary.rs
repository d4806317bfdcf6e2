//! Computed display totals for an event's pool and its payouts.

use crate::domain::{Contribution, Decimal, PaymentEvent, PayoutRequest, PayoutStatus};
use serde::Serialize;

/// `{balance, totalSettled, totalPaidOut}` plus the manually recorded total.
///
/// `total_settled` counts every PAID contribution, processor or manual, so
/// `balance == total_settled - total_paid_out` whenever the ledger is consistent.
/// `total_recorded_manually` is the manual share of `total_settled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSummary {
    pub balance: Decimal,
    pub total_settled: Decimal,
    pub total_paid_out: Decimal,
    pub total_recorded_manually: Decimal,
}

impl PoolSummary {
    pub fn compute(
        event: &PaymentEvent,
        contributions: &[Contribution],
        payouts: &[PayoutRequest],
    ) -> Self {
        Self {
            balance: event.pool_balance,
            total_settled: contributions.iter().map(Contribution::pooled_amount).sum(),
            total_paid_out: payouts.iter().map(PayoutRequest::withdrawn_amount).sum(),
            total_recorded_manually: contributions.iter().map(Contribution::manual_amount).sum(),
        }
    }

    /// True when the stored balance agrees with the rows that justify it.
    pub fn is_consistent(&self) -> bool {
        !self.balance.is_negative()
            && self.total_settled.checked_sub(self.total_paid_out) == Some(self.balance)
    }
}

/// Running totals over a list of payouts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PayoutTotals {
    pub paid: Decimal,
    /// Pending and in-transit amounts.
    pub pending: Decimal,
}

impl PayoutTotals {
    pub fn compute(payouts: &[PayoutRequest]) -> Self {
        let mut totals = PayoutTotals::default();
        for payout in payouts {
            match payout.status {
                PayoutStatus::Paid => totals.paid = totals.paid.saturating_add(payout.amount),
                PayoutStatus::Pending | PayoutStatus::InTransit => {
                    totals.pending = totals.pending.saturating_add(payout.amount)
                }
                PayoutStatus::Failed => {}
            }
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContributionStatus, GroupId, MemberId, Settlement, TimeMs};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn event_with_balance(balance: &str) -> PaymentEvent {
        let mut event = PaymentEvent::new(
            GroupId::new("g"),
            MemberId::new("org"),
            dec("50"),
            TimeMs::new(0),
        );
        event.pool_balance = dec(balance);
        event
    }

    fn paid(event: &PaymentEvent, member: &str, amount: &str, settlement: Settlement) -> Contribution {
        let mut c = Contribution::pending(event.id, MemberId::new(member));
        c.status = ContributionStatus::Paid;
        c.amount_settled = dec(amount);
        c.settlement = Some(settlement);
        c
    }

    fn payout(event: &PaymentEvent, amount: &str, status: PayoutStatus) -> PayoutRequest {
        let mut p = PayoutRequest::pending(event.id, MemberId::new("org"), dec(amount));
        p.status = status;
        p
    }

    #[test]
    fn summary_matches_balance_for_consistent_ledger() {
        let event = event_with_balance("50");
        let contributions = vec![
            paid(&event, "a", "50", Settlement::Processor { reference: "cs_a".into() }),
            paid(&event, "b", "50", Settlement::Processor { reference: "cs_b".into() }),
            paid(&event, "c", "20", Settlement::Manual { delta: dec("20") }),
            Contribution::pending(event.id, MemberId::new("d")),
        ];
        let payouts = vec![
            payout(&event, "40", PayoutStatus::Paid),
            payout(&event, "30", PayoutStatus::InTransit),
            payout(&event, "99", PayoutStatus::Failed),
        ];

        let summary = PoolSummary::compute(&event, &contributions, &payouts);
        assert_eq!(summary.total_settled, dec("120"));
        assert_eq!(summary.total_paid_out, dec("70"));
        assert_eq!(summary.total_recorded_manually, dec("20"));
        assert!(summary.is_consistent());
    }

    #[test]
    fn summary_detects_drift() {
        let event = event_with_balance("10");
        let summary = PoolSummary::compute(&event, &[], &[]);
        assert!(!summary.is_consistent());
    }

    #[test]
    fn payout_totals_split_paid_and_pending() {
        let event = event_with_balance("0");
        let totals = PayoutTotals::compute(&[
            payout(&event, "10", PayoutStatus::Paid),
            payout(&event, "5", PayoutStatus::Pending),
            payout(&event, "7", PayoutStatus::InTransit),
            payout(&event, "100", PayoutStatus::Failed),
        ]);
        assert_eq!(totals.paid, dec("10"));
        assert_eq!(totals.pending, dec("12"));
    }
}
