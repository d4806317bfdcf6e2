//! JSON views. Amounts are canonical decimal strings, field names camelCase.

use serde::Serialize;
use std::str::FromStr;

use crate::domain::{
    Contribution, Decimal, PaymentEvent, PayoutRequest, PayoutTotals, PoolSummary, Settlement,
};
use crate::error::AppError;

pub fn parse_amount(input: &str, field: &str) -> Result<Decimal, AppError> {
    Decimal::from_str_canonical(input)
        .ok()
        .filter(Decimal::is_within_amount_bounds)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid {}", field)))
}

/// Parse a path id; a malformed id is a 400.
pub fn parse_id<T: FromStr>(input: &str, kind: &str) -> Result<T, AppError> {
    input
        .parse::<T>()
        .map_err(|_| AppError::BadRequest(format!("Invalid {} id", kind)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub balance: String,
    pub total_settled: String,
    pub total_paid_out: String,
    pub total_recorded_manually: String,
}

impl From<&PoolSummary> for SummaryView {
    fn from(summary: &PoolSummary) -> Self {
        Self {
            balance: summary.balance.to_canonical_string(),
            total_settled: summary.total_settled.to_canonical_string(),
            total_paid_out: summary.total_paid_out.to_canonical_string(),
            total_recorded_manually: summary.total_recorded_manually.to_canonical_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: String,
    pub group_id: String,
    pub organizer_id: String,
    pub per_member_amount: String,
    pub due_ms: i64,
    pub pool_balance: String,
    pub created_ms: i64,
}

impl From<&PaymentEvent> for EventView {
    fn from(event: &PaymentEvent) -> Self {
        Self {
            id: event.id.to_string(),
            group_id: event.group_id.to_string(),
            organizer_id: event.organizer_id.to_string(),
            per_member_amount: event.per_member_amount.to_canonical_string(),
            due_ms: event.due_ms.as_ms(),
            pool_balance: event.pool_balance.to_canonical_string(),
            created_ms: event.created_ms.as_ms(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionView {
    pub id: String,
    pub event_id: String,
    pub member_id: String,
    pub amount_settled: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_delta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_ms: Option<i64>,
}

impl From<&Contribution> for ContributionView {
    fn from(c: &Contribution) -> Self {
        let (settlement_ref, manual_delta) = match &c.settlement {
            Some(Settlement::Processor { reference }) => (Some(reference.clone()), None),
            Some(Settlement::Manual { delta }) => (None, Some(delta.to_canonical_string())),
            None => (None, None),
        };
        Self {
            id: c.id.to_string(),
            event_id: c.event_id.to_string(),
            member_id: c.member_id.to_string(),
            amount_settled: c.amount_settled.to_canonical_string(),
            status: c.status.as_str(),
            method: c.settlement.as_ref().map(Settlement::method),
            settlement_ref,
            manual_delta,
            session_ref: c.session_ref.clone(),
            settled_ms: c.settled_ms.map(|t| t.as_ms()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutView {
    pub id: String,
    pub event_id: String,
    pub organizer_id: String,
    pub amount: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_ref: Option<String>,
    pub requested_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrived_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl From<&PayoutRequest> for PayoutView {
    fn from(p: &PayoutRequest) -> Self {
        Self {
            id: p.id.to_string(),
            event_id: p.event_id.to_string(),
            organizer_id: p.organizer_id.to_string(),
            amount: p.amount.to_canonical_string(),
            status: p.status.as_str(),
            transfer_ref: p.transfer_ref.clone(),
            requested_ms: p.requested_ms.as_ms(),
            expected_ms: p.expected_ms.map(|t| t.as_ms()),
            arrived_ms: p.arrived_ms.map(|t| t.as_ms()),
            failure_reason: p.failure_reason.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PayoutTotalsView {
    pub paid: String,
    pub pending: String,
}

impl From<&PayoutTotals> for PayoutTotalsView {
    fn from(totals: &PayoutTotals) -> Self {
        Self {
            paid: totals.paid.to_canonical_string(),
            pending: totals.pending.to_canonical_string(),
        }
    }
}
