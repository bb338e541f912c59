//! The analysis result consumed by every view, report, and narration.
//!
//! Field names serialize in camelCase for the browser; heatmap regions keep
//! the snake_case names the remote service emits because the compositor
//! contract is defined in those terms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Classification, RiskLevel};

/// Sentinel when the service reports no nodule.
pub const NO_NODULE_LOCATION: &str = "None detected";
/// Sentinel when the service reports no dimensions.
pub const NO_NODULE_DIMENSIONS: &str = "N/A";

/// Chronological age assumed when comparing lung age.
pub const DEFAULT_CHRONOLOGICAL_AGE: u32 = 45;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub classification: Classification,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub confidence: u8,
    pub findings: Vec<String>,
    pub recommendations: Vec<String>,
    pub nodule_location: String,
    pub nodule_dimensions: String,
    pub additional_observations: Vec<String>,
    /// Synthetic token minted at materialization. Never derived from patient input.
    pub patient_id: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub heatmap_regions: Vec<HeatmapRegion>,
    #[serde(default)]
    pub detailed_report: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lung_age: Option<LungAge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symmetry_analysis: Option<SymmetryAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_disease_results: Option<Vec<DiseaseResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison_results: Option<ComparisonResults>,
}

impl AnalysisResult {
    /// High-risk results trigger the urgent follow-up banner.
    pub fn requires_urgent_attention(&self) -> bool {
        self.risk_level == RiskLevel::High
    }

    /// Whether the service located a nodule at all.
    pub fn has_nodule(&self) -> bool {
        !self.nodule_location.is_empty() && self.nodule_location != NO_NODULE_LOCATION
    }
}

/// A hot spot to overlay: coordinates and size are percentages, intensity 0-1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapRegion {
    pub x_percent: f32,
    pub y_percent: f32,
    pub intensity: f32,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LungAge {
    pub age: u32,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LungAgeAssessment {
    Younger,
    Typical,
    Older,
}

impl LungAge {
    /// Compare against a chronological age. More than 5 years over reads as older.
    pub fn assess(&self, chronological_age: u32) -> LungAgeAssessment {
        let diff = i64::from(self.age) - i64::from(chronological_age);
        if diff < 0 {
            LungAgeAssessment::Younger
        } else if diff > 5 {
            LungAgeAssessment::Older
        } else {
            LungAgeAssessment::Typical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymmetryAnalysis {
    pub score: u8,
    #[serde(default)]
    pub asymmetric_regions: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymmetryBand {
    Symmetric,
    Mild,
    Concerning,
}

impl SymmetryAnalysis {
    pub fn band(&self) -> SymmetryBand {
        if self.score >= 70 {
            SymmetryBand::Symmetric
        } else if self.score < 50 {
            SymmetryBand::Concerning
        } else {
            SymmetryBand::Mild
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseResult {
    pub disease: String,
    pub present: bool,
    pub confidence: u8,
    #[serde(default)]
    pub findings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseStatus {
    Clear,
    Detected,
    Uncertain,
}

impl DiseaseResult {
    /// Confident negatives need 80, confident positives 70; the rest is uncertain.
    pub fn status(&self) -> DiseaseStatus {
        if !self.present && self.confidence >= 80 {
            DiseaseStatus::Clear
        } else if self.present && self.confidence >= 70 {
            DiseaseStatus::Detected
        } else {
            DiseaseStatus::Uncertain
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResults {
    #[serde(default)]
    pub changes: Vec<String>,
    #[serde(default)]
    pub progression_rate: f32,
    #[serde(default)]
    pub overall_trend: String,
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn serializes_camel_case_for_browser() {
        let json = serde_json::to_value(abnormal_result()).unwrap();
        assert_eq!(json["riskScore"], 78);
        assert_eq!(json["riskLevel"], "High");
        assert_eq!(json["noduleLocation"], "Right upper lobe");
        assert_eq!(json["heatmapRegions"][0]["x_percent"], 35.0);
        assert!(json.get("lungAge").is_none());
    }

    #[test]
    fn urgent_attention_only_for_high_risk() {
        assert!(abnormal_result().requires_urgent_attention());
        assert!(!normal_result().requires_urgent_attention());
    }

    #[test]
    fn nodule_sentinel_means_no_nodule() {
        assert!(!normal_result().has_nodule());
        assert!(abnormal_result().has_nodule());
    }

    #[test]
    fn lung_age_assessment() {
        let lung = |age| LungAge { age, notes: String::new() };
        assert_eq!(lung(40).assess(45), LungAgeAssessment::Younger);
        assert_eq!(lung(45).assess(45), LungAgeAssessment::Typical);
        assert_eq!(lung(50).assess(45), LungAgeAssessment::Typical);
        assert_eq!(lung(51).assess(45), LungAgeAssessment::Older);
    }

    #[test]
    fn symmetry_bands() {
        let sym = |score| SymmetryAnalysis {
            score,
            asymmetric_regions: vec![],
            notes: String::new(),
        };
        assert_eq!(sym(95).band(), SymmetryBand::Symmetric);
        assert_eq!(sym(70).band(), SymmetryBand::Symmetric);
        assert_eq!(sym(69).band(), SymmetryBand::Mild);
        assert_eq!(sym(50).band(), SymmetryBand::Mild);
        assert_eq!(sym(49).band(), SymmetryBand::Concerning);
    }

    #[test]
    fn disease_status_thresholds() {
        let d = |present, confidence| DiseaseResult {
            disease: "Pneumonia".into(),
            present,
            confidence,
            findings: vec![],
        };
        assert_eq!(d(false, 80).status(), DiseaseStatus::Clear);
        assert_eq!(d(false, 79).status(), DiseaseStatus::Uncertain);
        assert_eq!(d(true, 70).status(), DiseaseStatus::Detected);
        assert_eq!(d(true, 69).status(), DiseaseStatus::Uncertain);
    }

    #[test]
    fn roundtrips_through_json_storage() {
        let original = abnormal_result();
        let json = serde_json::to_string(&original).unwrap();
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
