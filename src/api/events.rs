use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::actor::Actor;
use crate::api::views::{parse_amount, parse_id, EventView, SummaryView};
use crate::api::AppState;
use crate::domain::{EventId, GroupId, TimeMs};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEventBody {
    pub group_id: String,
    pub per_member_amount: String,
    pub due_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub event: EventView,
    pub summary: SummaryView,
}

#[derive(Debug, Serialize)]
pub struct DeleteGroupResponse {
    pub deleted: u64,
}

pub async fn schedule_event(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Json(body): Json<ScheduleEventBody>,
) -> Result<(StatusCode, Json<EventResponse>), AppError> {
    let group_id = body.group_id.trim();
    if group_id.is_empty() {
        return Err(AppError::BadRequest("groupId is required".to_string()));
    }
    let per_member_amount = parse_amount(&body.per_member_amount, "perMemberAmount")?;

    let event = state
        .events
        .schedule_event(
            GroupId::new(group_id),
            &actor,
            per_member_amount,
            TimeMs::new(body.due_ms),
        )
        .await?;
    let (event, summary) = state.events.summary(&event.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            event: EventView::from(&event),
            summary: SummaryView::from(&summary),
        }),
    ))
}

pub async fn get_event(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(event_id): Path<String>,
) -> Result<Json<EventResponse>, AppError> {
    let event_id: EventId = parse_id(&event_id, "event")?;
    let (event, summary) = state.events.get_event(&event_id, &actor).await?;

    Ok(Json(EventResponse {
        event: EventView::from(&event),
        summary: SummaryView::from(&summary),
    }))
}

/// Called when a group is deleted upstream.
pub async fn delete_group_events(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(group_id): Path<String>,
) -> Result<Json<DeleteGroupResponse>, AppError> {
    let deleted = state
        .events
        .delete_group_events(&GroupId::new(group_id), &actor)
        .await?;
    Ok(Json(DeleteGroupResponse { deleted }))
}
