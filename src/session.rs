//! Screening session: the upload, its analysis, and everything derived from
//! them for the current cycle.
//!
//! Every mutation goes through `ScreeningSession::apply`. Uploads and resets
//! move the session to a new generation; an analysis result is only accepted
//! with the ticket of the attempt currently in flight, so a slow response can
//! never overwrite state that moved on while it was pending.

use serde::Serialize;
use thiserror::Error;

use crate::models::AnalysisResult;
use crate::pipeline::intake::AcceptedUpload;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("No image uploaded")]
    NoUpload,

    #[error("The disclaimer must be acknowledged before analysis")]
    TermsRequired,

    #[error("Analysis superseded by newer session state")]
    Superseded,
}

/// Proof that an analysis was started, checked again when it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTicket {
    generation: u64,
    attempt: u64,
}

impl AnalysisTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone)]
pub enum SessionAction {
    Upload(AcceptedUpload),
    /// Preprocessed data URL for the upload of `generation`.
    Preprocessed { generation: u64, data_url: String },
    AcknowledgeTerms,
    BeginAnalysis,
    CompleteAnalysis {
        ticket: AnalysisTicket,
        result: AnalysisResult,
        heatmap: Option<String>,
    },
    FailAnalysis {
        ticket: AnalysisTicket,
    },
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Applied,
    Started(AnalysisTicket),
}

/// Upload metadata without the payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// What the browser needs to render the current step. Never carries image
/// payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub generation: u64,
    pub upload: Option<UploadSummary>,
    pub preprocessed: bool,
    pub terms_acknowledged: bool,
    pub analyzing: bool,
    pub has_result: bool,
    pub has_heatmap: bool,
}

#[derive(Debug, Default)]
pub struct ScreeningSession {
    generation: u64,
    attempts: u64,
    upload: Option<AcceptedUpload>,
    preprocessed: Option<String>,
    terms_acknowledged: bool,
    in_flight: Option<AnalysisTicket>,
    result: Option<AnalysisResult>,
    heatmap: Option<String>,
}

impl ScreeningSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The single update path.
    pub fn apply(&mut self, action: SessionAction) -> Result<SessionOutcome, SessionError> {
        match action {
            SessionAction::Upload(upload) => {
                self.next_generation();
                tracing::debug!(
                    generation = self.generation,
                    size_bytes = upload.size_bytes,
                    "Session upload replaced"
                );
                self.upload = Some(upload);
            }
            SessionAction::Preprocessed {
                generation,
                data_url,
            } => {
                if self.upload.is_none() {
                    return Err(SessionError::NoUpload);
                }
                if generation != self.generation {
                    return Err(SessionError::Superseded);
                }
                self.preprocessed = Some(data_url);
            }
            SessionAction::AcknowledgeTerms => {
                self.terms_acknowledged = true;
            }
            SessionAction::BeginAnalysis => {
                if self.upload.is_none() {
                    return Err(SessionError::NoUpload);
                }
                if !self.terms_acknowledged {
                    return Err(SessionError::TermsRequired);
                }
                self.attempts += 1;
                let ticket = AnalysisTicket {
                    generation: self.generation,
                    attempt: self.attempts,
                };
                // A newer attempt on the same upload replaces any pending one.
                self.in_flight = Some(ticket);
                return Ok(SessionOutcome::Started(ticket));
            }
            SessionAction::CompleteAnalysis {
                ticket,
                result,
                heatmap,
            } => {
                self.check_ticket(ticket)?;
                self.in_flight = None;
                self.result = Some(result);
                self.heatmap = heatmap;
            }
            SessionAction::FailAnalysis { ticket } => {
                self.check_ticket(ticket)?;
                self.in_flight = None;
            }
            SessionAction::Reset => {
                self.next_generation();
                self.upload = None;
                tracing::debug!(generation = self.generation, "Session reset");
            }
        }
        Ok(SessionOutcome::Applied)
    }

    fn next_generation(&mut self) {
        self.generation += 1;
        self.preprocessed = None;
        self.in_flight = None;
        self.result = None;
        self.heatmap = None;
    }

    fn check_ticket(&self, ticket: AnalysisTicket) -> Result<(), SessionError> {
        if self.in_flight == Some(ticket) {
            Ok(())
        } else {
            tracing::info!(
                ticket_generation = ticket.generation,
                current_generation = self.generation,
                "Discarding stale analysis outcome"
            );
            Err(SessionError::Superseded)
        }
    }

    // ── Reads ────────────────────────────────────────────

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn upload(&self) -> Option<&AcceptedUpload> {
        self.upload.as_ref()
    }

    /// The payload sent for analysis: preprocessed if available, else the upload.
    pub fn analysis_payload(&self) -> Option<&str> {
        self.preprocessed
            .as_deref()
            .or_else(|| self.upload.as_ref().map(|u| u.data_url.as_str()))
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn heatmap(&self) -> Option<&str> {
        self.heatmap.as_deref()
    }

    pub fn terms_acknowledged(&self) -> bool {
        self.terms_acknowledged
    }

    pub fn is_analyzing(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            generation: self.generation,
            upload: self.upload.as_ref().map(|u| UploadSummary {
                file_name: u.file_name.clone(),
                mime_type: u.mime_type.clone(),
                size_bytes: u.size_bytes,
            }),
            preprocessed: self.preprocessed.is_some(),
            terms_acknowledged: self.terms_acknowledged,
            analyzing: self.in_flight.is_some(),
            has_result: self.result.is_some(),
            has_heatmap: self.heatmap.is_some(),
        }
    }
}
