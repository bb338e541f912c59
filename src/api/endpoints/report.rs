//! Report download, export and narration.

use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, ExportResponse};
use crate::report::{report_file_name, NarrationScript};

/// `GET /api/report`: the rendered report as a download.
pub async fn download(State(ctx): State<ApiContext>) -> Result<Response, ApiError> {
    let (bytes, result) = run_blocking(ctx.core.clone(), |core| core.render_report()).await?;

    let file_name = report_file_name(&result.patient_id, chrono::Utc::now().date_naive());
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{file_name}\""))
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static(ctx.core.report_content_type()),
        ),
        (header::CONTENT_DISPOSITION, disposition),
    ];
    Ok((headers, bytes).into_response())
}

/// `POST /api/report/export`: write the report into the exports directory.
pub async fn export(State(ctx): State<ApiContext>) -> Result<Json<ExportResponse>, ApiError> {
    let path = run_blocking(ctx.core.clone(), |core| core.export_report()).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Json(ExportResponse {
        path: path.display().to_string(),
        file_name,
    }))
}

/// `GET /api/narration`
pub async fn narration(State(ctx): State<ApiContext>) -> Result<Json<NarrationScript>, ApiError> {
    Ok(Json(ctx.core.narration()?))
}
