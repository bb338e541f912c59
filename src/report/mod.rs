//! Presentation capabilities kept behind narrow traits: PDF export and the
//! spoken summary script. Nothing in `pipeline` depends on this module.

pub mod narration;
pub mod pdf;

pub use narration::*;
pub use pdf::*;

use thiserror::Error;

use crate::models::AnalysisResult;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),

    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a report needs. Images are data URLs as held by the session.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub result: &'a AnalysisResult,
    pub original_image: &'a str,
    pub heatmap_image: Option<&'a str>,
}

/// Renders a result into a downloadable document.
pub trait ReportExporter: Send + Sync {
    fn export(&self, input: &ReportInput<'_>) -> Result<Vec<u8>, ReportError>;

    /// MIME type of the bytes `export` returns.
    fn content_type(&self) -> &'static str;
}

/// Produces the text a speech engine reads aloud.
pub trait Narrator: Send + Sync {
    fn script(&self, result: &AnalysisResult) -> String;
}
