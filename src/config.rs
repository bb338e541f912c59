use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "LungScan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const DATA_DIR_VAR: &str = "LUNGSCAN_DATA_DIR";

/// Get the application data directory.
/// `$LUNGSCAN_DATA_DIR` when set, else ~/LungScan/.
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Get the result cache directory
pub fn cache_dir() -> PathBuf {
    app_data_dir().join("cache")
}

/// Get the passport store directory
pub fn passport_dir() -> PathBuf {
    app_data_dir().join("passport")
}

/// Get the exported reports directory
pub fn exports_dir() -> PathBuf {
    app_data_dir().join("exports")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "lungscan_lib=debug,tower_http=info,info"
    } else {
        "lungscan_lib=info,warn"
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid bind address '{0}'")]
    InvalidBind(String),

    #[error("Invalid timeout '{0}': expected whole seconds > 0")]
    InvalidTimeout(String),
}

/// Settings for the local service, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Remote analysis function. `None` leaves analysis unavailable.
    pub analysis_url: Option<String>,
    pub api_key: Option<String>,
    pub bind: SocketAddr,
    pub timeout_secs: u64,
    /// Built browser front-end to serve at `/`.
    pub static_dir: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get("LUNGSCAN_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_raw.clone()))?;

        let timeout_secs = match get("LUNGSCAN_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::InvalidTimeout(raw))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            analysis_url: get("LUNGSCAN_ANALYSIS_URL"),
            api_key: get("LUNGSCAN_API_KEY"),
            bind,
            timeout_secs,
            static_dir: get("LUNGSCAN_STATIC_DIR").map(PathBuf::from),
        })
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            analysis_url: None,
            api_key: None,
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            static_dir: None,
        }
    }
}
