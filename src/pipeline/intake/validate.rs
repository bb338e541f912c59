use std::path::Path;

use serde::{Deserialize, Serialize};

use super::IntakeError;

/// MIME types accepted as-is.
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "application/dicom"];

/// DICOM files rarely carry a MIME type in browsers; the extension decides.
const DICOM_EXTENSIONS: &[&str] = &["dcm", "dicom"];

/// Anything smaller is unlikely to be a radiograph.
pub const MIN_FILE_BYTES: u64 = 50_000;

pub const MAX_FILE_BYTES: u64 = 20 * 1024 * 1024; // 20MB

/// What the browser knows about a picked file before it is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCandidate {
    pub file_name: String,
    pub declared_mime: String,
    pub size_bytes: u64,
}

impl FileCandidate {
    /// Build a candidate, guessing the MIME type from the extension when the
    /// browser did not declare one.
    pub fn new(file_name: &str, declared_mime: Option<&str>, size_bytes: u64) -> Self {
        let declared_mime = match declared_mime {
            Some(m) if !m.trim().is_empty() => m.trim().to_ascii_lowercase(),
            _ => mime_guess::from_path(file_name)
                .first_raw()
                .unwrap_or("application/octet-stream")
                .to_string(),
        };
        Self {
            file_name: file_name.to_string(),
            declared_mime,
            size_bytes,
        }
    }

    fn has_dicom_extension(&self) -> bool {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                DICOM_EXTENSIONS
                    .iter()
                    .any(|d| ext.eq_ignore_ascii_case(d))
            })
    }
}

/// Check a candidate file. Type, then floor, then ceiling: first failure wins.
pub fn validate(file: &FileCandidate) -> Result<(), IntakeError> {
    let type_ok = ACCEPTED_MIME_TYPES.contains(&file.declared_mime.as_str())
        || file.has_dicom_extension();
    if !type_ok {
        tracing::debug!(file = %file.file_name, mime = %file.declared_mime, "Rejected file type");
        return Err(IntakeError::InvalidType);
    }

    if file.size_bytes < MIN_FILE_BYTES {
        return Err(IntakeError::TooSmall {
            size_bytes: file.size_bytes,
        });
    }

    if file.size_bytes > MAX_FILE_BYTES {
        return Err(IntakeError::TooLarge {
            size_bytes: file.size_bytes,
        });
    }

    Ok(())
}
