use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::IntakeError;

/// Raw bytes and the MIME type a data URL carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDataUrl {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Materialise a whole file as `data:<mime>;base64,<payload>`.
pub fn read_as_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Split a base64 data URL back into MIME type and bytes.
pub fn decode_data_url(url: &str) -> Result<DecodedDataUrl, IntakeError> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| IntakeError::MalformedDataUrl("missing data: scheme".into()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| IntakeError::MalformedDataUrl("missing payload separator".into()))?;

    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| IntakeError::MalformedDataUrl("only base64 payloads are supported".into()))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| IntakeError::MalformedDataUrl(format!("invalid base64: {e}")))?;

    Ok(DecodedDataUrl {
        mime: mime.to_ascii_lowercase(),
        bytes,
    })
}

/// Label bytes by magic number. Only the two raster formats are recognised;
/// DICOM keeps whatever the browser declared.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        _ => None,
    }
}
