/// Analytics endpoints
///
/// # Endpoints
///
/// - `GET /analytics/task-distribution` - Per-assignee workload summary
/// - `GET /analytics/timeline?days=N` - Recent events on the caller's tasks

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use taskboard_shared::auth::context::AuthContext;
use taskboard_shared::models::analytics::{self, TaskDistribution};
use taskboard_shared::models::task_event::TaskEvent;

/// Timeline query parameters
#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    /// Window size in days, 1 to the configured maximum
    pub days: Option<i64>,
}

/// Per-assignee workload summary
///
/// One entry per user with at least one assigned task, ordered by user ID.
/// The overdue count covers tasks whose due date has passed and that are
/// not done.
pub async fn task_distribution(
    State(state): State<AppState>,
    Extension(_auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TaskDistribution>>> {
    let distribution = analytics::task_distribution(&state.db).await?;
    Ok(Json(distribution))
}

/// Recent events on tasks the caller created or is assigned to
///
/// Newest first. The window defaults to the configured number of days.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: `days` outside the accepted range
pub async fn timeline(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<TimelineParams>,
) -> ApiResult<Json<Vec<TaskEvent>>> {
    let limits = &state.config.limits;
    let days = params.days.unwrap_or(limits.timeline_default_days);

    if days < 1 || days > limits.timeline_max_days {
        return Err(crate::error::ApiError::invalid_field(
            "days",
            format!("Must be between 1 and {}", limits.timeline_max_days),
        ));
    }

    let since = Utc::now() - Duration::days(days);
    let events = TaskEvent::timeline(&state.db, auth.user_id, since).await?;

    Ok(Json(events))
}
