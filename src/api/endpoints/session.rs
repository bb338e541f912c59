//! Session flags and lifecycle.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::session::{SessionAction, SessionSnapshot};

/// `GET /api/session`
pub async fn snapshot(State(ctx): State<ApiContext>) -> Result<Json<SessionSnapshot>, ApiError> {
    Ok(Json(ctx.core.snapshot()?))
}

/// `POST /api/terms`: the user accepted the disclaimer.
pub async fn acknowledge_terms(
    State(ctx): State<ApiContext>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    ctx.core.apply(SessionAction::AcknowledgeTerms)?;
    Ok(Json(ctx.core.snapshot()?))
}

/// `POST /api/reset`: drop the upload and result, start a new cycle.
pub async fn reset(State(ctx): State<ApiContext>) -> Result<Json<SessionSnapshot>, ApiError> {
    ctx.core.apply(SessionAction::Reset)?;
    tracing::info!("Session reset");
    Ok(Json(ctx.core.snapshot()?))
}
