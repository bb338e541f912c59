//! Local API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`. When a built front-end directory is
//! given, everything else is served from it.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Two 20 MB scans as base64 data URLs, plus JSON framing.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build the API router.
///
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>, static_dir: Option<PathBuf>) -> Router {
    let ctx = ApiContext::new(core);
    build_router(ctx, static_dir)
}

fn build_router(ctx: ApiContext, static_dir: Option<PathBuf>) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/intake", post(endpoints::scan::intake))
        .route("/preprocess", post(endpoints::scan::preprocess))
        .route("/terms", post(endpoints::session::acknowledge_terms))
        .route("/session", get(endpoints::session::snapshot))
        .route("/reset", post(endpoints::session::reset))
        .route("/analyze", post(endpoints::analysis::analyze))
        .route("/result", get(endpoints::analysis::result))
        .route("/heatmap", get(endpoints::analysis::heatmap))
        .route("/simulate", post(endpoints::analysis::simulate))
        .route("/report", get(endpoints::report::download))
        .route("/report/export", post(endpoints::report::export))
        .route("/narration", get(endpoints::report::narration))
        .route(
            "/passport",
            get(endpoints::passport::list).delete(endpoints::passport::clear),
        )
        .with_state(ctx);

    let mut app = Router::new().nest("/api", api);
    if let Some(dir) = static_dir {
        tracing::info!(dir = %dir.display(), "Serving front-end");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::core_state::fixtures::{abnormal_payload, core_with, mock};
    use crate::pipeline::analysis::{AnalysisError, MockAnalysisBackend, UnconfiguredBackend};
    use crate::pipeline::intake::fixtures::large_png;
    use crate::pipeline::intake::read_as_data_url;

    fn test_app(payload: Value) -> (Router, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(core_with(mock(payload), tmp.path().join("exports")));
        (api_router(core, None), tmp)
    }

    fn make_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(response: axum::http::Response<Body>) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 8 * 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> axum::http::Response<Body> {
        app.clone().oneshot(req).await.unwrap()
    }

    fn intake_body() -> Value {
        json!({
            "fileName": "chest.png",
            "mimeType": "image/png",
            "dataUrl": read_as_data_url(&large_png(), "image/png"),
        })
    }

    /// Upload, accept the terms and analyse in standard mode.
    async fn analysed(app: &Router) -> Value {
        let r = send(app, make_request("POST", "/api/intake", Some(intake_body()))).await;
        assert_eq!(r.status(), StatusCode::OK);
        let r = send(app, make_request("POST", "/api/terms", None)).await;
        assert_eq!(r.status(), StatusCode::OK);
        let r = send(
            app,
            make_request("POST", "/api/analyze", Some(json!({"mode": "standard"}))),
        )
        .await;
        assert_eq!(r.status(), StatusCode::OK);
        response_json(r).await
    }

    #[tokio::test]
    async fn health_response_shape() {
        let (app, _tmp) = test_app(abnormal_payload());
        let response = send(&app, make_request("GET", "/api/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], crate::config::APP_VERSION);
        assert_eq!(json["analysisConfigured"], true);
    }

    #[tokio::test]
    async fn health_reports_unconfigured_backend() {
        let tmp = tempfile::tempdir().unwrap();
        let core = Arc::new(core_with(Arc::new(UnconfiguredBackend), tmp.path().to_path_buf()));
        let app = api_router(core, None);
        let json = response_json(send(&app, make_request("GET", "/api/health", None)).await).await;
        assert_eq!(json["analysisConfigured"], false);
    }

    #[tokio::test]
    async fn not_found_for_unknown_route() {
        let (app, _tmp) = test_app(abnormal_payload());
        let response = send(&app, make_request("GET", "/api/nonexistent", None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn intake_rejects_small_file() {
        let (app, _tmp) = test_app(abnormal_payload());
        let body = json!({
            "fileName": "tiny.png",
            "dataUrl": read_as_data_url(&[0u8; 100], "image/png"),
        });
        let response = send(&app, make_request("POST", "/api/intake", Some(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_FILE");
        assert_eq!(
            json["error"]["message"],
            "File seems too small for a medical X-ray image."
        );
    }

    #[tokio::test]
    async fn intake_rejects_wrong_type() {
        let (app, _tmp) = test_app(abnormal_payload());
        let body = json!({
            "fileName": "notes.txt",
            "mimeType": "text/plain",
            "dataUrl": read_as_data_url(&large_png(), "text/plain"),
        });
        let response = send(&app, make_request("POST", "/api/intake", Some(body))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn intake_snapshot_hides_payload() {
        let (app, _tmp) = test_app(abnormal_payload());
        let response = send(&app, make_request("POST", "/api/intake", Some(intake_body()))).await;
        let json = response_json(response).await;
        assert_eq!(json["upload"]["fileName"], "chest.png");
        assert!(json["upload"].get("dataUrl").is_none());
        assert_eq!(json["hasResult"], false);
    }

    #[tokio::test]
    async fn analyze_requires_upload_then_terms() {
        let (app, _tmp) = test_app(abnormal_payload());
        let analyze = || make_request("POST", "/api/analyze", Some(json!({})));

        let response = send(&app, analyze()).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response_json(response).await["error"]["code"], "NO_UPLOAD");

        send(&app, make_request("POST", "/api/intake", Some(intake_body()))).await;
        let response = send(&app, analyze()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response_json(response).await["error"]["code"], "TERMS_REQUIRED");
    }

    #[tokio::test]
    async fn full_flow_produces_every_output() {
        let (app, tmp) = test_app(abnormal_payload());
        let result = analysed(&app).await;
        assert_eq!(result["classification"], "Abnormal");
        assert_eq!(result["riskScore"], 72);
        assert_eq!(result["riskLevel"], "High");

        let r = send(&app, make_request("GET", "/api/result", None)).await;
        assert_eq!(response_json(r).await, result);

        let r = send(&app, make_request("GET", "/api/heatmap", None)).await;
        let heatmap = response_json(r).await;
        assert!(heatmap["dataUrl"]
            .as_str()
            .unwrap()
            .starts_with("data:image/png;base64,"));

        let r = send(&app, make_request("GET", "/api/narration", None)).await;
        let narration = response_json(r).await;
        assert!(narration["text"]
            .as_str()
            .unwrap()
            .starts_with("Analysis complete. Classification: Abnormal."));

        let r = send(&app, make_request("GET", "/api/report", None)).await;
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(r.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = r.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[0..4], b"%PDF");

        let r = send(&app, make_request("POST", "/api/report/export", None)).await;
        let export = response_json(r).await;
        let path = std::path::PathBuf::from(export["path"].as_str().unwrap());
        assert!(path.starts_with(tmp.path()));
        assert!(export["fileName"]
            .as_str()
            .unwrap()
            .starts_with("LungScan_Report_"));

        let r = send(&app, make_request("GET", "/api/passport", None)).await;
        let passport = response_json(r).await;
        assert_eq!(passport.as_array().unwrap().len(), 1);
        assert_eq!(passport[0]["riskScore"], 72);
    }

    #[tokio::test]
    async fn low_confidence_abnormal_is_reported_inconclusive() {
        let (app, _tmp) = test_app(json!({
            "classification": "Abnormal",
            "risk_score": 82,
            "confidence": 60,
            "findings": ["Ground-glass opacity"],
        }));
        let result = analysed(&app).await;
        assert_eq!(result["classification"], "Inconclusive");
        assert_eq!(result["riskLevel"], "Medium");
        assert_eq!(result["riskScore"], 45);
    }

    #[tokio::test]
    async fn remote_rejection_maps_to_422() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockAnalysisBackend::failing(AnalysisError::InvalidImage {
            message: "This does not appear to be a chest X-ray".into(),
            confidence: Some(95),
        }));
        let app = api_router(Arc::new(core_with(backend, tmp.path().to_path_buf())), None);

        send(&app, make_request("POST", "/api/intake", Some(intake_body()))).await;
        send(&app, make_request("POST", "/api/terms", None)).await;
        let r = send(&app, make_request("POST", "/api/analyze", Some(json!({})))).await;
        assert_eq!(r.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let snapshot = response_json(send(&app, make_request("GET", "/api/session", None)).await).await;
        assert_eq!(snapshot["analyzing"], false);
        assert_eq!(snapshot["hasResult"], false);
    }

    #[tokio::test]
    async fn comparison_without_previous_scan_is_bad_request() {
        let (app, _tmp) = test_app(abnormal_payload());
        send(&app, make_request("POST", "/api/intake", Some(intake_body()))).await;
        send(&app, make_request("POST", "/api/terms", None)).await;
        let r = send(
            &app,
            make_request("POST", "/api/analyze", Some(json!({"mode": "comparison"}))),
        )
        .await;
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn simulate_needs_result_and_projects_risk() {
        let (app, _tmp) = test_app(abnormal_payload());
        let body = json!({"monthsSmokeFree": 12, "pollutionReductionPct": 50.0});

        let r = send(&app, make_request("POST", "/api/simulate", Some(body.clone()))).await;
        assert_eq!(r.status(), StatusCode::CONFLICT);

        analysed(&app).await;
        let r = send(&app, make_request("POST", "/api/simulate", Some(body))).await;
        let sim = response_json(r).await;
        assert_eq!(sim["simulatedRisk"], 47);
        assert_eq!(sim["reductionPct"], 35);
    }

    #[tokio::test]
    async fn reset_clears_result_but_keeps_passport() {
        let (app, _tmp) = test_app(abnormal_payload());
        analysed(&app).await;

        let r = send(&app, make_request("POST", "/api/reset", None)).await;
        let snapshot = response_json(r).await;
        assert!(snapshot["upload"].is_null());
        assert_eq!(snapshot["termsAcknowledged"], true);

        let r = send(&app, make_request("GET", "/api/heatmap", None)).await;
        assert_eq!(r.status(), StatusCode::CONFLICT);

        let r = send(&app, make_request("GET", "/api/passport", None)).await;
        assert_eq!(response_json(r).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn passport_delete_wipes_history() {
        let (app, _tmp) = test_app(abnormal_payload());
        analysed(&app).await;

        let r = send(&app, make_request("DELETE", "/api/passport", None)).await;
        assert_eq!(r.status(), StatusCode::NO_CONTENT);
        let r = send(&app, make_request("GET", "/api/passport", None)).await;
        assert!(response_json(r).await.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn preprocess_requires_upload() {
        let (app, _tmp) = test_app(abnormal_payload());
        let r = send(&app, make_request("POST", "/api/preprocess", None)).await;
        assert_eq!(r.status(), StatusCode::CONFLICT);

        send(&app, make_request("POST", "/api/intake", Some(intake_body()))).await;
        let r = send(&app, make_request("POST", "/api/preprocess", None)).await;
        assert_eq!(r.status(), StatusCode::OK);
        assert_eq!(response_json(r).await["preprocessed"], true);
    }

    #[tokio::test]
    async fn static_dir_serves_front_end() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("index.html"), "<h1>LungScan</h1>").unwrap();
        let core = Arc::new(core_with(mock(abnormal_payload()), tmp.path().join("exports")));
        let app = api_router(core, Some(tmp.path().to_path_buf()));

        let r = send(&app, make_request("GET", "/index.html", None)).await;
        assert_eq!(r.status(), StatusCode::OK);
        let r = send(&app, make_request("GET", "/api/health", None)).await;
        assert_eq!(r.status(), StatusCode::OK);
    }
}
