use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Classification;

/// One line in the health passport. Written once, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassportEntry {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub risk_score: u8,
    pub classification: Classification,
    pub findings: Vec<String>,
    /// Leading slice of the scan's data URL, enough for a thumbnail header.
    pub image_preview: String,
}
