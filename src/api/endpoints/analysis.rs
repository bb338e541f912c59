//! Analysis, its outputs, and the what-if simulator.

use axum::extract::State;
use axum::Json;

use super::run_blocking;
use crate::api::error::ApiError;
use crate::api::types::{AnalyzeRequest, ApiContext, HeatmapResponse, SimulateRequest};
use crate::models::AnalysisResult;
use crate::pipeline::simulator::SimulationOutcome;

/// `POST /api/analyze`: run one analysis of the current upload.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, ApiError> {
    tracing::info!(mode = %req.mode, "Analysis requested");
    let result = run_blocking(ctx.core.clone(), move |core| {
        core.run_analysis(req.mode, req.previous_scan_data_url)
    })
    .await?;
    Ok(Json(result))
}

/// `GET /api/result`
pub async fn result(State(ctx): State<ApiContext>) -> Result<Json<AnalysisResult>, ApiError> {
    Ok(Json(ctx.core.current_result()?))
}

/// `GET /api/heatmap`
pub async fn heatmap(State(ctx): State<ApiContext>) -> Result<Json<HeatmapResponse>, ApiError> {
    Ok(Json(HeatmapResponse {
        data_url: ctx.core.current_heatmap()?,
    }))
}

/// `POST /api/simulate`: `null` when the current risk is 0.
pub async fn simulate(
    State(ctx): State<ApiContext>,
    Json(req): Json<SimulateRequest>,
) -> Result<Json<Option<SimulationOutcome>>, ApiError> {
    let outcome = ctx
        .core
        .simulate(req.months_smoke_free, req.pollution_reduction_pct)?;
    Ok(Json(outcome))
}
