//! Image intake: file checks and data-URL materialisation.
//!
//! The browser posts the picked file as a data URL. Intake decodes it,
//! runs the file rules against name, MIME and decoded size, and hands back
//! an `AcceptedUpload` whose data URL is labelled by content where the
//! magic bytes are recognisable.

pub mod data_url;
pub mod validate;

pub use data_url::*;
pub use validate::*;

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntakeError {
    #[error("Invalid file type. Please upload a JPEG, PNG, or DICOM file.")]
    InvalidType,

    #[error("File seems too small for a medical X-ray image.")]
    TooSmall { size_bytes: u64 },

    #[error("File size exceeds 20MB limit.")]
    TooLarge { size_bytes: u64 },

    #[error("Malformed data URL: {0}")]
    MalformedDataUrl(String),
}

impl IntakeError {
    /// The three file-rule failures, as opposed to transport problems.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidType | Self::TooSmall { .. } | Self::TooLarge { .. }
        )
    }
}

/// An upload that passed every file rule and is ready for analysis.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedUpload {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    #[serde(skip)]
    pub data_url: String,
}

/// Decode, validate and relabel a browser upload.
pub fn accept_upload(
    file_name: &str,
    declared_mime: Option<&str>,
    data_url: &str,
) -> Result<AcceptedUpload, IntakeError> {
    let decoded = decode_data_url(data_url)?;
    // The MIME embedded in the data URL is what the browser saw; an explicit
    // field wins, and an empty one falls back to the extension.
    let declared = declared_mime
        .filter(|m| !m.trim().is_empty())
        .or(Some(decoded.mime.as_str()).filter(|m| !m.is_empty()));

    let candidate = FileCandidate::new(file_name, declared, decoded.bytes.len() as u64);
    validate(&candidate)?;

    let mime_type = sniff_image_mime(&decoded.bytes)
        .map(str::to_string)
        .unwrap_or_else(|| candidate.declared_mime.clone());

    tracing::info!(
        file = file_name,
        mime = %mime_type,
        size_bytes = candidate.size_bytes,
        "Upload accepted"
    );

    Ok(AcceptedUpload {
        file_name: file_name.to_string(),
        data_url: read_as_data_url(&decoded.bytes, &mime_type),
        mime_type,
        size_bytes: candidate.size_bytes,
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::large_png;
    use super::*;

    #[test]
    fn accepts_png_and_relabels_by_content() {
        let bytes = large_png();
        // Browser claimed JPEG, content is PNG
        let url = read_as_data_url(&bytes, "image/jpeg");
        let upload = accept_upload("chest.jpg", Some("image/jpeg"), &url).unwrap();
        assert_eq!(upload.mime_type, "image/png");
        assert_eq!(upload.size_bytes, bytes.len() as u64);
        assert!(upload.data_url.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn falls_back_to_data_url_mime() {
        let url = read_as_data_url(&large_png(), "image/png");
        let upload = accept_upload("scan", None, &url).unwrap();
        assert_eq!(upload.mime_type, "image/png");
    }

    #[test]
    fn rejects_small_upload() {
        let url = read_as_data_url(&[0x89, b'P', b'N', b'G'], "image/png");
        let err = accept_upload("tiny.png", Some("image/png"), &url).unwrap_err();
        assert!(matches!(err, IntakeError::TooSmall { size_bytes: 4 }));
        assert!(err.is_validation());
    }

    #[test]
    fn rejects_garbage_data_url() {
        let err = accept_upload("x.png", None, "not a data url").unwrap_err();
        assert!(matches!(err, IntakeError::MalformedDataUrl(_)));
        assert!(!err.is_validation());
    }

    #[test]
    fn validation_messages_are_user_facing() {
        assert_eq!(
            IntakeError::TooLarge { size_bytes: 1 }.to_string(),
            "File size exceeds 20MB limit."
        );
        assert_eq!(
            IntakeError::InvalidType.to_string(),
            "Invalid file type. Please upload a JPEG, PNG, or DICOM file."
        );
    }
}
