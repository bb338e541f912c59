//! Application state shared by every HTTP handler.
//!
//! `CoreState` owns the screening session and the long-lived services
//! (orchestrator, passport, report capabilities). Handlers hold it behind an
//! `Arc`; the session sits in a `RwLock` so snapshots and reads never wait on
//! each other, and every write funnels through `ScreeningSession::apply`.
//! Slow work (remote analysis, image processing) runs with no lock held.

use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard};

use thiserror::Error;

use crate::models::{AnalysisMode, AnalysisResult};
use crate::passport::HealthPassport;
use crate::pipeline::analysis::{AnalysisError, AnalysisOrchestrator, AnalysisRequest};
use crate::pipeline::heatmap::composite_data_url;
use crate::pipeline::intake::{accept_upload, decode_data_url, IntakeError};
use crate::pipeline::preprocess::{preprocess, PreprocessError, ScanInputConfig};
use crate::pipeline::simulator::{simulate, SimulationOutcome};
use crate::report::{
    export_to_file, NarrationScript, Narrator, PdfReportExporter, ReportError, ReportExporter,
    ReportInput, ScriptNarrator,
};
use crate::session::{
    AnalysisTicket, ScreeningSession, SessionAction, SessionError, SessionOutcome,
    SessionSnapshot,
};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    session: RwLock<ScreeningSession>,
    orchestrator: AnalysisOrchestrator,
    passport: HealthPassport,
    exporter: Box<dyn ReportExporter>,
    narrator: Box<dyn Narrator>,
    scan_config: ScanInputConfig,
    /// Where `export_report` writes files.
    pub exports_dir: PathBuf,
}

impl CoreState {
    /// State with the PDF exporter and the script narrator.
    pub fn new(
        orchestrator: AnalysisOrchestrator,
        passport: HealthPassport,
        exports_dir: PathBuf,
    ) -> Self {
        Self {
            session: RwLock::new(ScreeningSession::new()),
            orchestrator,
            passport,
            exporter: Box::new(PdfReportExporter),
            narrator: Box::new(ScriptNarrator),
            scan_config: ScanInputConfig::default(),
            exports_dir,
        }
    }

    // ── Session access ──────────────────────────────────

    pub fn read_session(&self) -> Result<RwLockReadGuard<'_, ScreeningSession>, CoreError> {
        self.session.read().map_err(|_| CoreError::LockPoisoned)
    }

    /// Apply one action under the write lock.
    pub fn apply(&self, action: SessionAction) -> Result<SessionOutcome, CoreError> {
        let mut guard = self.session.write().map_err(|_| CoreError::LockPoisoned)?;
        Ok(guard.apply(action)?)
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, CoreError> {
        Ok(self.read_session()?.snapshot())
    }

    pub fn current_result(&self) -> Result<AnalysisResult, CoreError> {
        self.read_session()?
            .result()
            .cloned()
            .ok_or(CoreError::NoResult)
    }

    pub fn current_heatmap(&self) -> Result<String, CoreError> {
        let guard = self.read_session()?;
        if guard.result().is_none() {
            return Err(CoreError::NoResult);
        }
        guard.heatmap().map(str::to_string).ok_or(CoreError::NoHeatmap)
    }

    // ── Services ────────────────────────────────────────

    pub fn orchestrator(&self) -> &AnalysisOrchestrator {
        &self.orchestrator
    }

    pub fn passport(&self) -> &HealthPassport {
        &self.passport
    }

    // ── Workflow ────────────────────────────────────────

    /// Validate a browser upload and start a new cycle with it.
    pub fn intake(
        &self,
        file_name: &str,
        declared_mime: Option<&str>,
        data_url: &str,
    ) -> Result<SessionSnapshot, CoreError> {
        let upload = accept_upload(file_name, declared_mime, data_url)?;
        let mut guard = self.session.write().map_err(|_| CoreError::LockPoisoned)?;
        guard.apply(SessionAction::Upload(upload))?;
        Ok(guard.snapshot())
    }

    /// Normalise the current upload. Blocking.
    pub fn run_preprocess(&self) -> Result<SessionSnapshot, CoreError> {
        let (generation, source) = {
            let guard = self.read_session()?;
            let upload = guard.upload().ok_or(SessionError::NoUpload)?;
            (guard.generation(), upload.data_url.clone())
        };

        let bytes = decode_data_url(&source)?.bytes;
        let prepared = preprocess(&bytes, &self.scan_config)?;

        let mut guard = self.session.write().map_err(|_| CoreError::LockPoisoned)?;
        guard.apply(SessionAction::Preprocessed {
            generation,
            data_url: prepared.to_data_url(),
        })?;
        Ok(guard.snapshot())
    }

    /// Run one analysis attempt for the current upload. Blocking.
    ///
    /// The session lock is released while the remote call runs. The outcome
    /// is committed with the attempt's ticket, so an upload or reset in the
    /// meantime turns it into `Superseded` and nothing is recorded.
    pub fn run_analysis(
        &self,
        mode: AnalysisMode,
        previous_scan: Option<String>,
    ) -> Result<AnalysisResult, CoreError> {
        let (ticket, payload, original) = self.begin_analysis()?;

        let mut request = AnalysisRequest::new(payload, mode);
        if let Some(previous) = previous_scan {
            request = request.with_previous_scan(previous);
        }

        let result = match self.orchestrator.analyze(&request) {
            Ok(result) => result,
            Err(e) => {
                // A stale failure has nothing to clear.
                if let Err(commit) = self.apply(SessionAction::FailAnalysis { ticket }) {
                    tracing::debug!(error = %commit, "Failure not committed");
                }
                return Err(CoreError::Analysis(e));
            }
        };

        let heatmap = match composite_data_url(&original, &result.heatmap_regions) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(error = %e, "Heatmap compositing failed, result kept without it");
                None
            }
        };

        self.apply(SessionAction::CompleteAnalysis {
            ticket,
            result: result.clone(),
            heatmap,
        })?;
        self.passport.record(&result, &original);
        Ok(result)
    }

    fn begin_analysis(&self) -> Result<(AnalysisTicket, String, String), CoreError> {
        let mut guard = self.session.write().map_err(|_| CoreError::LockPoisoned)?;
        let ticket = match guard.apply(SessionAction::BeginAnalysis)? {
            SessionOutcome::Started(ticket) => ticket,
            SessionOutcome::Applied => {
                return Err(CoreError::Internal("analysis did not start".into()))
            }
        };
        let payload = guard.analysis_payload().ok_or(SessionError::NoUpload)?.to_string();
        let original = guard
            .upload()
            .map(|u| u.data_url.clone())
            .ok_or(SessionError::NoUpload)?;
        Ok((ticket, payload, original))
    }

    /// What-if projection on the current result's risk. `None` at zero risk.
    pub fn simulate(
        &self,
        months_smoke_free: u32,
        pollution_reduction_pct: f64,
    ) -> Result<Option<SimulationOutcome>, CoreError> {
        let risk = self.current_result()?.risk_score;
        Ok(simulate(u32::from(risk), months_smoke_free, pollution_reduction_pct))
    }

    /// Render the report for the current result. Blocking.
    pub fn render_report(&self) -> Result<(Vec<u8>, AnalysisResult), CoreError> {
        let (result, original, heatmap) = {
            let guard = self.read_session()?;
            let result = guard.result().cloned().ok_or(CoreError::NoResult)?;
            let original = guard
                .upload()
                .map(|u| u.data_url.clone())
                .ok_or(SessionError::NoUpload)?;
            (result, original, guard.heatmap().map(str::to_string))
        };

        let input = ReportInput {
            result: &result,
            original_image: &original,
            heatmap_image: heatmap.as_deref(),
        };
        let bytes = self.exporter.export(&input)?;
        Ok((bytes, result))
    }

    pub fn report_content_type(&self) -> &'static str {
        self.exporter.content_type()
    }

    /// Render the report and write it into `exports_dir`. Blocking.
    pub fn export_report(&self) -> Result<PathBuf, CoreError> {
        let (bytes, result) = self.render_report()?;
        Ok(export_to_file(&bytes, &self.exports_dir, &result)?)
    }

    pub fn narration(&self) -> Result<NarrationScript, CoreError> {
        let result = self.current_result()?;
        Ok(NarrationScript::new(self.narrator.script(&result)))
    }
}

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("No analysis result available")]
    NoResult,
    #[error("No heatmap available for the current result")]
    NoHeatmap,
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::analysis::{AnalysisBackend, MockAnalysisBackend};
    use crate::pipeline::cache::{MemoryKvStore, ResultCache};

    /// State over in-memory stores and the given backend.
    pub fn core_with(backend: Arc<dyn AnalysisBackend>, exports_dir: PathBuf) -> CoreState {
        let orchestrator = AnalysisOrchestrator::new(
            backend,
            ResultCache::new(Arc::new(MemoryKvStore::new())),
        );
        let passport = HealthPassport::new(Arc::new(MemoryKvStore::new()));
        CoreState::new(orchestrator, passport, exports_dir)
    }

    /// Stage-2 payload of a confident abnormal read with one hot spot.
    pub fn abnormal_payload() -> serde_json::Value {
        serde_json::json!({
            "classification": "Abnormal",
            "risk_score": 72,
            "confidence": 91,
            "findings": ["Spiculated nodule"],
            "nodule_location": "Left lower lobe",
            "nodule_dimensions": "2.1cm",
            "heatmap_regions": [
                {"x_percent": 60, "y_percent": 70, "intensity": 0.8, "size": 15}
            ]
        })
    }

    pub fn mock(payload: serde_json::Value) -> Arc<MockAnalysisBackend> {
        Arc::new(MockAnalysisBackend::new(payload))
    }
}
