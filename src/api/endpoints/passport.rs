//! Health passport: the local history of analyses.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::PassportEntry;

/// `GET /api/passport`: oldest first.
pub async fn list(State(ctx): State<ApiContext>) -> Result<Json<Vec<PassportEntry>>, ApiError> {
    let entries = run_blocking(ctx.core.clone(), |core| Ok(core.passport().entries())).await?;
    Ok(Json(entries))
}

/// `DELETE /api/passport`
pub async fn clear(State(ctx): State<ApiContext>) -> Result<StatusCode, ApiError> {
    run_blocking(ctx.core.clone(), |core| {
        core.passport().clear();
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
