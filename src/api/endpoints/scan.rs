//! Upload intake and optional preprocessing.

use axum::extract::State;
use axum::Json;

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, IntakeRequest};
use crate::session::SessionSnapshot;

/// `POST /api/intake`: validate the picked file and start a new cycle.
pub async fn intake(
    State(ctx): State<ApiContext>,
    Json(req): Json<IntakeRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = run_blocking(ctx.core.clone(), move |core| {
        core.intake(&req.file_name, req.mime_type.as_deref(), &req.data_url)
    })
    .await?;
    Ok(Json(snapshot))
}

/// `POST /api/preprocess`: normalise the current upload for analysis.
pub async fn preprocess(State(ctx): State<ApiContext>) -> Result<Json<SessionSnapshot>, ApiError> {
    let snapshot = run_blocking(ctx.core.clone(), |core| core.run_preprocess()).await?;
    Ok(Json(snapshot))
}
