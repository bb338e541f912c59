use serde::Serialize;

use super::AnalysisError;
use crate::models::AnalysisMode;

/// One analysis job: the scan payload plus the mode it is analysed under.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Data URL of the (optionally preprocessed) scan.
    pub image_payload: String,
    pub mode: AnalysisMode,
    /// Previous scan for comparison mode.
    pub previous_scan: Option<String>,
}

impl AnalysisRequest {
    pub fn new(image_payload: String, mode: AnalysisMode) -> Self {
        Self {
            image_payload,
            mode,
            previous_scan: None,
        }
    }

    pub fn with_previous_scan(mut self, previous: String) -> Self {
        self.previous_scan = Some(previous);
        self
    }

    /// Wire body for the remote function. The reference scan is only sent in
    /// comparison mode.
    pub fn body(&self) -> RemoteRequestBody<'_> {
        RemoteRequestBody {
            image_base64: &self.image_payload,
            mode: self.mode.as_str(),
            previous_scan_base64: if self.mode.needs_reference_scan() {
                self.previous_scan.as_deref()
            } else {
                None
            },
        }
    }
}

/// JSON body posted to the analysis function.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequestBody<'a> {
    pub image_base64: &'a str,
    pub mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_scan_base64: Option<&'a str>,
}

/// The remote interpretation service.
///
/// Returns the accepted stage-2 payload as raw JSON; every rejection and
/// transport failure is already mapped to an `AnalysisError`. Blocking:
/// async callers go through `spawn_blocking`.
pub trait AnalysisBackend: Send + Sync {
    fn analyze(&self, request: &AnalysisRequest) -> Result<serde_json::Value, AnalysisError>;

    /// Where requests go, for logs and the health endpoint.
    fn endpoint(&self) -> &str;

    /// False when no remote service was set up and every call fails.
    fn is_configured(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_uses_camel_case_wire_names() {
        let req = AnalysisRequest::new("data:image/jpeg;base64,AAA".into(), AnalysisMode::Standard);
        let json = serde_json::to_value(req.body()).unwrap();
        assert_eq!(json["imageBase64"], "data:image/jpeg;base64,AAA");
        assert_eq!(json["mode"], "standard");
        assert!(json.get("previousScanBase64").is_none());
    }

    #[test]
    fn previous_scan_only_sent_in_comparison_mode() {
        let req = AnalysisRequest::new("a".into(), AnalysisMode::MultiDisease)
            .with_previous_scan("b".into());
        assert!(req.body().previous_scan_base64.is_none());

        let req = AnalysisRequest::new("a".into(), AnalysisMode::Comparison)
            .with_previous_scan("b".into());
        let json = serde_json::to_value(req.body()).unwrap();
        assert_eq!(json["previousScanBase64"], "b");
        assert_eq!(json["mode"], "comparison");
    }
}
