use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use serde_json::Value;

use super::types::{AnalysisBackend, AnalysisRequest};
use super::{AnalysisError, DecodeError};

/// Longest slice of an error body carried into messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// HTTP client for the remote analysis function.
pub struct HttpAnalysisClient {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpAnalysisClient {
    /// Build a client for `endpoint`. `api_key`, when set, is sent both as a
    /// bearer token and as the `apikey` header the function gateway expects.
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, AnalysisError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AnalysisError::RemoteService(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_secs,
        })
    }
}

impl AnalysisBackend for HttpAnalysisClient {
    fn analyze(&self, request: &AnalysisRequest) -> Result<Value, AnalysisError> {
        let mut builder = self.client.post(&self.endpoint).json(&request.body());
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key).header("apikey", key);
        }

        let response = builder.send().map_err(|e| {
            if e.is_connect() {
                AnalysisError::RemoteService(format!(
                    "Analysis service unreachable at {}",
                    self.endpoint
                ))
            } else if e.is_timeout() {
                AnalysisError::RemoteService(format!(
                    "Request timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                AnalysisError::RemoteService(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let body = response
            .text()
            .map_err(|e| AnalysisError::RemoteService(format!("Failed to read response: {e}")))?;

        interpret_response(status, &body, retry_after)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Map a raw HTTP exchange onto the accepted payload or an `AnalysisError`.
///
/// The function reports its own upstream quota problems as a 500 with a
/// message, so those messages are recognised as well as the status codes.
pub fn interpret_response(
    status: u16,
    body: &str,
    retry_after: Option<u64>,
) -> Result<Value, AnalysisError> {
    let parsed: Result<Value, _> = serde_json::from_str(body);

    if (200..300).contains(&status) {
        let value = parsed.map_err(|e| DecodeError::Json(e.to_string()))?;
        if value.get("error").is_some() {
            return Err(error_from_body(status, &value, retry_after));
        }
        return Ok(value);
    }

    match status {
        429 => Err(AnalysisError::RateLimited {
            retry_after_secs: retry_after,
        }),
        402 => Err(AnalysisError::QuotaExceeded(
            parsed
                .ok()
                .and_then(|v| message_of(&v))
                .unwrap_or_else(|| "AI credits depleted".into()),
        )),
        _ => match parsed {
            Ok(value) => Err(error_from_body(status, &value, retry_after)),
            Err(_) => Err(AnalysisError::RemoteService(format!(
                "status {status}: {}",
                truncate(body)
            ))),
        },
    }
}

fn error_from_body(status: u16, body: &Value, retry_after: Option<u64>) -> AnalysisError {
    let code = body.get("error").and_then(Value::as_str).unwrap_or_default();
    let message = message_of(body).unwrap_or_else(|| format!("status {status}"));

    if code == "invalid_image" {
        return AnalysisError::InvalidImage {
            message,
            confidence: body
                .get("confidence")
                .and_then(Value::as_f64)
                .filter(|c| (0.0..=100.0).contains(c))
                .map(|c| c.round() as u8),
        };
    }

    let lowered = message.to_ascii_lowercase();
    if lowered.contains("rate limit exceeded") {
        AnalysisError::RateLimited {
            retry_after_secs: retry_after,
        }
    } else if lowered.contains("credits depleted") {
        AnalysisError::QuotaExceeded(message)
    } else {
        AnalysisError::RemoteService(format!("status {status}: {message}"))
    }
}

/// `message`, else a non-sentinel `error` string.
fn message_of(body: &Value) -> Option<String> {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
        .map(truncate)
}

fn truncate(s: &str) -> String {
    s.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

/// Stand-in when no endpoint is configured. Every call fails with
/// `NotConfigured` so the rest of the service still runs.
pub struct UnconfiguredBackend;

impl AnalysisBackend for UnconfiguredBackend {
    fn analyze(&self, _request: &AnalysisRequest) -> Result<Value, AnalysisError> {
        Err(AnalysisError::NotConfigured)
    }

    fn endpoint(&self) -> &str {
        "unconfigured"
    }

    fn is_configured(&self) -> bool {
        false
    }
}

// ── Test double ───────────────────────────────────────────

/// In-process backend returning a configured outcome, counting calls.
pub struct MockAnalysisBackend {
    outcome: Result<Value, AnalysisError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<AnalysisRequest>>,
}

impl MockAnalysisBackend {
    pub fn new(payload: Value) -> Self {
        Self {
            outcome: Ok(payload),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(error: AnalysisError) -> Self {
        Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<AnalysisRequest> {
        self.last_request.lock().ok().and_then(|g| g.clone())
    }
}

impl AnalysisBackend for MockAnalysisBackend {
    fn analyze(&self, request: &AnalysisRequest) -> Result<Value, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }
        self.outcome.clone()
    }

    fn endpoint(&self) -> &str {
        "mock://analysis"
    }
}
