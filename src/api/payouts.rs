use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::actor::Actor;
use crate::api::views::{parse_amount, parse_id, PayoutTotalsView, PayoutView, SummaryView};
use crate::api::AppState;
use crate::domain::{EventId, MemberId};
use crate::error::AppError;
use crate::ledger::PayoutListing;

/// Omitting `amount` withdraws the whole balance.
#[derive(Debug, Default, Deserialize)]
pub struct PayoutBody {
    pub amount: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PayoutResponse {
    pub payout: PayoutView,
    pub summary: SummaryView,
}

#[derive(Debug, Serialize)]
pub struct PayoutsResponse {
    pub payouts: Vec<PayoutView>,
    pub totals: PayoutTotalsView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryView>,
}

impl PayoutsResponse {
    fn new(listing: &PayoutListing, summary: Option<SummaryView>) -> Self {
        Self {
            payouts: listing.payouts.iter().map(PayoutView::from).collect(),
            totals: PayoutTotalsView::from(&listing.totals),
            summary,
        }
    }
}

pub async fn request_payout(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(event_id): Path<String>,
    body: Option<Json<PayoutBody>>,
) -> Result<(StatusCode, Json<PayoutResponse>), AppError> {
    let event_id: EventId = parse_id(&event_id, "event")?;
    let Json(body) = body.unwrap_or_default();
    let amount = body
        .amount
        .as_deref()
        .map(|s| parse_amount(s, "amount"))
        .transpose()?;

    let payout = state
        .payouts
        .request_payout(&event_id, &actor, amount)
        .await?;
    let (_, summary) = state.events.summary(&event_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(PayoutResponse {
            payout: PayoutView::from(&payout),
            summary: SummaryView::from(&summary),
        }),
    ))
}

pub async fn list_event_payouts(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(event_id): Path<String>,
) -> Result<Json<PayoutsResponse>, AppError> {
    let event_id: EventId = parse_id(&event_id, "event")?;
    let listing = state
        .payouts
        .list_payouts_for_event(&event_id, &actor)
        .await?;
    let (_, summary) = state.events.summary(&event_id).await?;

    Ok(Json(PayoutsResponse::new(
        &listing,
        Some(SummaryView::from(&summary)),
    )))
}

pub async fn list_organizer_payouts(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(organizer_id): Path<String>,
) -> Result<Json<PayoutsResponse>, AppError> {
    let listing = state
        .payouts
        .list_payouts_for_organizer(&MemberId::new(organizer_id), &actor)
        .await?;
    Ok(Json(PayoutsResponse::new(&listing, None)))
}
