use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::fingerprint::storage_key;
use super::kv_store::KeyValueStore;
use super::StorageError;
use crate::models::AnalysisResult;

/// Bump when the persisted `AnalysisResult` shape changes incompatibly.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// How long a cached analysis stays valid.
pub const CACHE_TTL_HOURS: i64 = 24;

/// Persisted form of a cached analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub version: u32,
    pub result: AnalysisResult,
    pub cached_at: DateTime<Utc>,
}

/// Fingerprint-keyed analysis cache over a `KeyValueStore`.
///
/// Expired or unreadable records are dropped when looked up; nothing sweeps
/// the store in the background.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: Duration::hours(CACHE_TTL_HOURS),
        }
    }

    pub fn lookup(&self, fingerprint: &str) -> Option<AnalysisResult> {
        self.lookup_at(fingerprint, Utc::now())
    }

    /// Lookup against an explicit clock.
    pub fn lookup_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Option<AnalysisResult> {
        let key = storage_key(fingerprint);
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(fingerprint, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(fingerprint, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let entry = match decode_entry(&raw) {
            Some(entry) => entry,
            None => {
                warn!(fingerprint, "Discarding unreadable or outdated cache record");
                self.discard(&key);
                return None;
            }
        };

        if now - entry.cached_at >= self.ttl {
            debug!(fingerprint, cached_at = %entry.cached_at, "Cache entry expired");
            self.discard(&key);
            return None;
        }

        debug!(fingerprint, "Cache hit");
        Some(entry.result)
    }

    /// Store a fresh result. Failures are logged and swallowed.
    pub fn store(&self, fingerprint: &str, result: &AnalysisResult) {
        self.store_at(fingerprint, result, Utc::now());
    }

    pub fn store_at(&self, fingerprint: &str, result: &AnalysisResult, now: DateTime<Utc>) {
        let entry = CacheEntry {
            version: CACHE_FORMAT_VERSION,
            result: result.clone(),
            cached_at: now,
        };
        let outcome = serde_json::to_string(&entry)
            .map_err(StorageError::from)
            .and_then(|json| self.store.set(&storage_key(fingerprint), &json));
        if let Err(e) = outcome {
            warn!(fingerprint, error = %e, "Cache write failed, continuing without cache");
        }
    }

    fn discard(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key, error = %e, "Failed to remove stale cache record");
        }
    }
}

/// Parse a record, refusing anything not written by the current format.
fn decode_entry(raw: &str) -> Option<CacheEntry> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let version = value.get("version")?.as_u64()?;
    if version != u64::from(CACHE_FORMAT_VERSION) {
        return None;
    }
    serde_json::from_value(value).ok()
}
