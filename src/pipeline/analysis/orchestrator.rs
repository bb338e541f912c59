use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::threshold::apply_confidence_threshold;
use super::types::{AnalysisBackend, AnalysisRequest};
use super::wire::decode_analysis;
use super::AnalysisError;
use crate::models::AnalysisResult;
use crate::pipeline::cache::{fingerprint, ResultCache};

/// Runs one analysis: cache → remote → decode → threshold → cache.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    backend: Arc<dyn AnalysisBackend>,
    cache: ResultCache,
}

impl AnalysisOrchestrator {
    pub fn new(backend: Arc<dyn AnalysisBackend>, cache: ResultCache) -> Self {
        Self { backend, cache }
    }

    pub fn endpoint(&self) -> &str {
        self.backend.endpoint()
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_configured()
    }

    /// Analyse a scan, serving repeat requests from the cache.
    ///
    /// A cache hit returns the stored result with only the timestamp
    /// refreshed; the threshold rule is never re-applied to it. Rejections
    /// and failures are never cached.
    ///
    /// The cache key covers the scan payload and the mode only. In
    /// comparison mode a different reference scan for the same image is
    /// served the cached `comparison_results` until the entry expires.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let _span = tracing::info_span!(
            "analyze_xray",
            mode = %request.mode,
            payload_len = request.image_payload.len(),
        )
        .entered();

        if request.mode.needs_reference_scan() && request.previous_scan.is_none() {
            return Err(AnalysisError::MissingReferenceScan);
        }

        let key = fingerprint(&request.image_payload, request.mode.as_str());
        if let Some(mut cached) = self.cache.lookup(&key) {
            info!(fingerprint = %key, "Serving analysis from cache");
            cached.analysis_timestamp = Utc::now();
            return Ok(cached);
        }

        let start = std::time::Instant::now();
        debug!(endpoint = self.backend.endpoint(), "Calling analysis service");
        let payload = self.backend.analyze(request).map_err(|e| {
            warn!(
                error = %e,
                elapsed_ms = %start.elapsed().as_millis(),
                "Analysis service call failed"
            );
            e
        })?;

        let decoded = decode_analysis(payload, Utc::now()).map_err(|e| {
            warn!(error = %e, "Analysis payload rejected by decoder");
            AnalysisError::from(e)
        })?;

        let (result, downgraded) = apply_confidence_threshold(decoded);
        if downgraded {
            info!(
                confidence = result.confidence,
                "Low-confidence abnormal call downgraded to inconclusive"
            );
        }

        info!(
            elapsed_ms = %start.elapsed().as_millis(),
            classification = %result.classification,
            risk_score = result.risk_score,
            regions = result.heatmap_regions.len(),
            "Analysis complete"
        );

        self.cache.store(&key, &result);
        Ok(result)
    }
}
