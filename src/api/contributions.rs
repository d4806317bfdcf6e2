use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::actor::Actor;
use crate::api::views::{parse_amount, parse_id, ContributionView, SummaryView};
use crate::api::AppState;
use crate::domain::{Contribution, ContributionId, EventId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct AmountBody {
    pub amount: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionsResponse {
    pub event_id: String,
    pub contributions: Vec<ContributionView>,
    pub summary: SummaryView,
}

#[derive(Debug, Serialize)]
pub struct ContributionResponse {
    pub contribution: ContributionView,
    pub summary: SummaryView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub contribution: ContributionView,
    pub redirect_url: String,
    pub summary: SummaryView,
}

/// Ensure rows for current members, then list them. Served on both the GET
/// listing and the explicit POST `ensure` route.
pub async fn list_contributions(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(event_id): Path<String>,
) -> Result<Json<ContributionsResponse>, AppError> {
    let event_id: EventId = parse_id(&event_id, "event")?;
    let contributions = state
        .contributions
        .list_contributions(&event_id, &actor)
        .await?;
    let (_, summary) = state.events.summary(&event_id).await?;

    Ok(Json(ContributionsResponse {
        event_id: event_id.to_string(),
        contributions: contributions.iter().map(ContributionView::from).collect(),
        summary: SummaryView::from(&summary),
    }))
}

pub async fn begin_checkout(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contribution_id): Path<String>,
    Json(body): Json<AmountBody>,
) -> Result<Json<CheckoutResponse>, AppError> {
    let contribution_id: ContributionId = parse_id(&contribution_id, "contribution")?;
    let amount = parse_amount(&body.amount, "amount")?;

    let started = state
        .contributions
        .begin_external_settlement(&contribution_id, amount, &actor)
        .await?;
    let (_, summary) = state.events.summary(&started.contribution.event_id).await?;

    Ok(Json(CheckoutResponse {
        contribution: ContributionView::from(&started.contribution),
        redirect_url: started.redirect_url,
        summary: SummaryView::from(&summary),
    }))
}

pub async fn apply_manual(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contribution_id): Path<String>,
    Json(body): Json<AmountBody>,
) -> Result<Json<ContributionResponse>, AppError> {
    let contribution_id: ContributionId = parse_id(&contribution_id, "contribution")?;
    let amount = parse_amount(&body.amount, "amount")?;

    let contribution = state
        .contributions
        .apply_manual_settlement(&contribution_id, amount, &actor)
        .await?;
    respond(&state, contribution).await
}

pub async fn undo_manual(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contribution_id): Path<String>,
) -> Result<Json<ContributionResponse>, AppError> {
    let contribution_id: ContributionId = parse_id(&contribution_id, "contribution")?;

    let contribution = state
        .contributions
        .undo_manual_settlement(&contribution_id, &actor)
        .await?;
    respond(&state, contribution).await
}

async fn respond(
    state: &AppState,
    contribution: Contribution,
) -> Result<Json<ContributionResponse>, AppError> {
    let (_, summary) = state.events.summary(&contribution.event_id).await?;
    Ok(Json(ContributionResponse {
        contribution: ContributionView::from(&contribution),
        summary: SummaryView::from(&summary),
    }))
}
