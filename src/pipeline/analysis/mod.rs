//! Remote chest X-ray interpretation.
//!
//! cache lookup → remote call → strict decode → defaults → confidence
//! threshold → cache store. The remote service itself is external; this
//! module only speaks its wire contract.

pub mod client;
pub mod defaults;
pub mod orchestrator;
pub mod threshold;
pub mod types;
pub mod wire;

pub use client::*;
pub use defaults::*;
pub use orchestrator::*;
pub use threshold::*;
pub use types::*;
pub use wire::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Stage-1 rejection: the service does not think this is a chest X-ray.
    #[error("Not a chest X-ray: {message}")]
    InvalidImage {
        message: String,
        confidence: Option<u8>,
    },

    #[error("Analysis service rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Analysis service quota exhausted: {0}")]
    QuotaExceeded(String),

    #[error("Analysis service error: {0}")]
    RemoteService(String),

    #[error("Malformed analysis payload: {0}")]
    Decode(#[from] DecodeError),

    #[error("Comparison mode requires a previous scan")]
    MissingReferenceScan,

    #[error("No analysis endpoint configured")]
    NotConfigured,
}

impl AnalysisError {
    /// Errors the user can act on by retrying later or picking another image.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidImage { .. }
                | Self::RateLimited { .. }
                | Self::QuotaExceeded(_)
                | Self::MissingReferenceScan
        )
    }
}

/// The stage-2 payload did not match the expected schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(String),

    #[error("unexpected shape: {0}")]
    Shape(String),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },

    #[error("unknown classification: {0}")]
    UnknownClassification(String),
}
