pub mod api; // Local HTTP API for the browser front-end
pub mod config;
pub mod core_state; // Transport-agnostic state
pub mod models;
pub mod passport; // Health passport
pub mod pipeline;
pub mod report; // PDF export + narration script
pub mod session; // Screening session, single update path

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use config::ServiceConfig;
use core_state::CoreState;
use passport::HealthPassport;
use pipeline::analysis::{AnalysisBackend, AnalysisOrchestrator, HttpAnalysisClient, UnconfiguredBackend};
use pipeline::cache::{FileKvStore, KeyValueStore, MemoryKvStore, ResultCache};

pub fn run() -> Result<(), String> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("LungScan starting v{}", config::APP_VERSION);

    let settings = ServiceConfig::from_env().map_err(|e| e.to_string())?;

    // The blocking HTTP client is created and dropped outside the runtime.
    let core = Arc::new(build_core(&settings)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start runtime: {e}"))?;

    let outcome = runtime.block_on(serve(core.clone(), &settings));
    drop(runtime);
    drop(core);
    outcome
}

async fn serve(core: Arc<CoreState>, settings: &ServiceConfig) -> Result<(), String> {
    let mut server =
        api::start_api_server(core, settings.bind, settings.static_dir.clone()).await?;
    tracing::info!(addr = %server.addr(), "LungScan ready");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for shutdown signal: {e}"))?;

    server.shutdown();
    Ok(())
}

fn build_core(settings: &ServiceConfig) -> Result<CoreState, String> {
    let backend = build_backend(settings)?;
    let cache = ResultCache::new(open_store(&config::cache_dir(), "cache"));
    let passport = HealthPassport::new(open_store(&config::passport_dir(), "passport"));

    Ok(CoreState::new(
        AnalysisOrchestrator::new(backend, cache),
        passport,
        config::exports_dir(),
    ))
}

fn build_backend(settings: &ServiceConfig) -> Result<Arc<dyn AnalysisBackend>, String> {
    match &settings.analysis_url {
        Some(url) => {
            let client =
                HttpAnalysisClient::new(url, settings.api_key.clone(), settings.timeout_secs)
                    .map_err(|e| e.to_string())?;
            tracing::info!(endpoint = %client.endpoint(), "Remote analysis configured");
            Ok(Arc::new(client))
        }
        None => {
            tracing::warn!("LUNGSCAN_ANALYSIS_URL not set, analysis is unavailable");
            Ok(Arc::new(UnconfiguredBackend))
        }
    }
}

/// Disk-backed store, or an in-memory one when the directory is unusable.
fn open_store(dir: &Path, name: &str) -> Arc<dyn KeyValueStore> {
    match FileKvStore::open(dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(store = name, error = %e, "Falling back to in-memory store");
            Arc::new(MemoryKvStore::new())
        }
    }
}
