/// Health check endpoint
///
/// `GET /health` is the one unauthenticated route besides registration and
/// login. It reports overall status plus whether the database answers:
///
/// ```json
/// { "status": "healthy", "version": "0.1.0", "database": "connected" }
/// ```
///
/// Status degrades to `"degraded"` when the database probe fails; the
/// endpoint itself still returns 200 so load balancers can distinguish
/// "process up, store down" from "process down".

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use taskboard_shared::db::pool::health_check;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_ok = health_check(&state.db).await.is_ok();

    let (status, database) = if database_ok {
        ("healthy", "connected")
    } else {
        ("degraded", "disconnected")
    };

    Ok(Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
    }))
}
