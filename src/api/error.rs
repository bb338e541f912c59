//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::core_state::CoreError;
use crate::pipeline::analysis::AnalysisError;
use crate::pipeline::preprocess::PreprocessError;
use crate::session::SessionError;

/// Structured error response body for the browser.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid file: {0}")]
    InvalidFile(String),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),
    #[error("Analysis service not configured")]
    NotConfigured,
    #[error("Terms not acknowledged")]
    TermsRequired,
    #[error("No upload")]
    NoUpload,
    #[error("No result")]
    NoResult,
    #[error("No heatmap")]
    NoHeatmap,
    #[error("Superseded by a newer upload")]
    Superseded,
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::InvalidFile(detail) => {
                (StatusCode::BAD_REQUEST, "INVALID_FILE", detail.clone())
            }
            ApiError::InvalidImage(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_IMAGE",
                detail.clone(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                match retry_after {
                    Some(secs) => format!("Rate limit exceeded. Retry after {secs}s"),
                    None => "Rate limit exceeded. Please try again later.".to_string(),
                },
            ),
            ApiError::QuotaExceeded(detail) => (
                StatusCode::PAYMENT_REQUIRED,
                "QUOTA_EXCEEDED",
                detail.clone(),
            ),
            ApiError::AnalysisFailed(detail) => {
                tracing::warn!(detail, "Analysis request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "ANALYSIS_FAILED",
                    "Failed to analyze image. Please try again.".to_string(),
                )
            }
            ApiError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                "ANALYSIS_UNAVAILABLE",
                "No analysis service is configured".to_string(),
            ),
            ApiError::TermsRequired => (
                StatusCode::FORBIDDEN,
                "TERMS_REQUIRED",
                "Please acknowledge the terms before analysis".to_string(),
            ),
            ApiError::NoUpload => (
                StatusCode::CONFLICT,
                "NO_UPLOAD",
                "Upload an X-ray image first".to_string(),
            ),
            ApiError::NoResult => (
                StatusCode::CONFLICT,
                "NO_RESULT",
                "No analysis result available".to_string(),
            ),
            ApiError::NoHeatmap => (
                StatusCode::CONFLICT,
                "NO_HEATMAP",
                "No heatmap available for the current result".to_string(),
            ),
            ApiError::Superseded => (
                StatusCode::CONFLICT,
                "SUPERSEDED",
                "A newer upload replaced this analysis".to_string(),
            ),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited {
            retry_after: Some(secs),
        } = &self
        {
            if let Ok(val) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Session(e) => e.into(),
            CoreError::NoResult => ApiError::NoResult,
            CoreError::NoHeatmap => ApiError::NoHeatmap,
            CoreError::Intake(e) if e.is_validation() => ApiError::InvalidFile(e.to_string()),
            CoreError::Intake(e) => ApiError::BadRequest(e.to_string()),
            CoreError::Preprocess(PreprocessError::ImageDecode(detail)) => {
                ApiError::InvalidImage(format!("Could not read the image: {detail}"))
            }
            CoreError::Preprocess(e) => ApiError::Internal(e.to_string()),
            CoreError::Analysis(e) => e.into(),
            CoreError::Report(e) => ApiError::Internal(e.to_string()),
            CoreError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NoUpload => ApiError::NoUpload,
            SessionError::TermsRequired => ApiError::TermsRequired,
            SessionError::Superseded => ApiError::Superseded,
        }
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::InvalidImage { message, .. } => ApiError::InvalidImage(message),
            AnalysisError::RateLimited { retry_after_secs } => ApiError::RateLimited {
                retry_after: retry_after_secs,
            },
            AnalysisError::QuotaExceeded(detail) => ApiError::QuotaExceeded(detail),
            AnalysisError::MissingReferenceScan => ApiError::BadRequest(err.to_string()),
            AnalysisError::NotConfigured => ApiError::NotConfigured,
            AnalysisError::RemoteService(_) | AnalysisError::Decode(_) => {
                ApiError::AnalysisFailed(err.to_string())
            }
        }
    }
}
