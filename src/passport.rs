//! Health passport: an append-only local history of completed analyses.
//!
//! Stored as one versioned JSON record under a fixed key. Entries are never
//! edited; the only removal is a full wipe. Storage failures are logged and
//! swallowed so the analysis flow never stops on them.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AnalysisResult, PassportEntry};
use crate::pipeline::cache::{KeyValueStore, StorageError};

pub const PASSPORT_KEY: &str = "lungscan_health_passport";
pub const PASSPORT_FORMAT_VERSION: u32 = 1;

/// Characters of the scan data URL kept as a preview.
pub const IMAGE_PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Serialize, Deserialize)]
struct PassportRecord {
    version: u32,
    entries: Vec<PassportEntry>,
}

pub struct HealthPassport {
    store: Arc<dyn KeyValueStore>,
    /// Serialises read-modify-write appends.
    write_lock: Mutex<()>,
}

impl HealthPassport {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// All entries, oldest first. Unreadable or outdated records read as empty.
    pub fn entries(&self) -> Vec<PassportEntry> {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Passport read failed");
            Vec::new()
        })
    }

    /// Stored entries. A failed store read is an error, never an empty history.
    fn load(&self) -> Result<Vec<PassportEntry>, StorageError> {
        let Some(raw) = self.store.get(PASSPORT_KEY)? else {
            return Ok(Vec::new());
        };
        Ok(decode_record(&raw).unwrap_or_else(|| {
            tracing::warn!("Passport record unreadable or outdated, treating as empty");
            Vec::new()
        }))
    }

    /// Append one entry for a completed analysis. Returns the entry even when
    /// persisting it failed.
    pub fn record(&self, result: &AnalysisResult, image_data_url: &str) -> PassportEntry {
        let entry = PassportEntry {
            id: Uuid::new_v4(),
            date: Utc::now(),
            risk_score: result.risk_score,
            classification: result.classification,
            findings: result.findings.clone(),
            image_preview: image_data_url.chars().take(IMAGE_PREVIEW_CHARS).collect(),
        };

        let Ok(_guard) = self.write_lock.lock() else {
            tracing::warn!("Passport lock poisoned, entry not persisted");
            return entry;
        };

        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Passport read failed, entry not persisted");
                return entry;
            }
        };
        entries.push(entry.clone());
        let record = PassportRecord {
            version: PASSPORT_FORMAT_VERSION,
            entries,
        };
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(e) = self.store.set(PASSPORT_KEY, &json) {
                    tracing::warn!(error = %e, "Passport write failed, entry not persisted");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Passport serialization failed"),
        }

        tracing::info!(entry_id = %entry.id, total = record.entries.len(), "Passport entry recorded");
        entry
    }

    /// Wipe the whole history.
    pub fn clear(&self) {
        let Ok(_guard) = self.write_lock.lock() else {
            tracing::warn!("Passport lock poisoned, history not cleared");
            return;
        };
        if let Err(e) = self.store.remove(PASSPORT_KEY) {
            tracing::warn!(error = %e, "Passport clear failed");
        } else {
            tracing::info!("Passport cleared");
        }
    }
}

fn decode_record(raw: &str) -> Option<Vec<PassportEntry>> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    if value.get("version")?.as_u64()? != u64::from(PASSPORT_FORMAT_VERSION) {
        return None;
    }
    serde_json::from_value::<PassportRecord>(value)
        .ok()
        .map(|r| r.entries)
}
