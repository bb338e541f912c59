//! Strict decoder for the stage-2 analysis payload.
//!
//! The service emits snake_case fields; a deployed function that already
//! post-processed its output may send the camelCase equivalents, which are
//! accepted as aliases. Unknown extra fields are ignored. Known fields with
//! the wrong type or an out-of-range value are a `DecodeError`, never a
//! silent pass-through.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::defaults::{
    default_recommendations, mint_patient_id, DEFAULT_CLASSIFICATION, DEFAULT_CONFIDENCE,
    DEFAULT_RISK_SCORE,
};
use super::DecodeError;
use crate::models::{
    AnalysisResult, Classification, ComparisonResults, DiseaseResult, HeatmapRegion, LungAge,
    RiskLevel, SymmetryAnalysis, NO_NODULE_DIMENSIONS, NO_NODULE_LOCATION,
};

/// Oldest lung age the service can plausibly report.
const MAX_LUNG_AGE: f64 = 150.0;

#[derive(Debug, Deserialize)]
struct WirePayload {
    classification: Option<String>,
    #[serde(alias = "riskScore")]
    risk_score: Option<f64>,
    confidence: Option<f64>,
    findings: Option<Vec<String>>,
    recommendations: Option<Vec<String>>,
    #[serde(alias = "noduleLocation")]
    nodule_location: Option<String>,
    #[serde(alias = "noduleDimensions")]
    nodule_dimensions: Option<String>,
    #[serde(alias = "additionalObservations")]
    additional_observations: Option<Vec<String>>,
    #[serde(alias = "heatmapRegions")]
    heatmap_regions: Option<Vec<WireRegion>>,
    #[serde(alias = "detailedReport")]
    detailed_report: Option<String>,
    #[serde(alias = "lungAge")]
    lung_age: Option<WireLungAge>,
    #[serde(alias = "symmetryAnalysis")]
    symmetry_analysis: Option<WireSymmetry>,
    #[serde(alias = "multiDiseaseResults")]
    multi_disease_results: Option<Vec<WireDisease>>,
    #[serde(alias = "comparisonResults")]
    comparison_results: Option<WireComparison>,
}

#[derive(Debug, Deserialize)]
struct WireRegion {
    x_percent: f64,
    y_percent: f64,
    intensity: f64,
    size: f64,
}

#[derive(Debug, Deserialize)]
struct WireLungAge {
    age: f64,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSymmetry {
    score: f64,
    #[serde(default, alias = "asymmetricRegions")]
    asymmetric_regions: Option<Vec<String>>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDisease {
    disease: String,
    present: bool,
    confidence: f64,
    #[serde(default)]
    findings: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct WireComparison {
    #[serde(default)]
    changes: Option<Vec<String>>,
    #[serde(default, alias = "progressionRate")]
    progression_rate: Option<f64>,
    #[serde(default, alias = "overallTrend")]
    overall_trend: Option<String>,
}

/// Decode an accepted payload into a fully-defaulted `AnalysisResult`.
///
/// `now` stamps both the analysis timestamp and the synthetic patient id.
/// The confidence threshold is not applied here.
pub fn decode_analysis(
    value: serde_json::Value,
    now: DateTime<Utc>,
) -> Result<AnalysisResult, DecodeError> {
    if !value.is_object() {
        return Err(DecodeError::Shape("expected a JSON object".into()));
    }
    let wire: WirePayload =
        serde_json::from_value(value).map_err(|e| DecodeError::Shape(e.to_string()))?;

    let classification = match non_blank(wire.classification) {
        Some(raw) => Classification::parse_loose(&raw)
            .map_err(|_| DecodeError::UnknownClassification(raw))?,
        None => DEFAULT_CLASSIFICATION,
    };

    let risk_score = match wire.risk_score {
        Some(v) => percent("risk_score", v)?,
        None => DEFAULT_RISK_SCORE,
    };
    let risk_level = RiskLevel::from_score(risk_score);

    let confidence = match wire.confidence {
        Some(v) => percent("confidence", v)?,
        None => DEFAULT_CONFIDENCE,
    };

    let heatmap_regions = wire
        .heatmap_regions
        .unwrap_or_default()
        .into_iter()
        .map(region)
        .collect::<Result<Vec<_>, _>>()?;

    let lung_age = wire
        .lung_age
        .map(|l| {
            Ok::<_, DecodeError>(LungAge {
                age: bounded_integer("lung_age.age", l.age, MAX_LUNG_AGE)? as u32,
                notes: l.notes.unwrap_or_default(),
            })
        })
        .transpose()?;

    let symmetry_analysis = wire
        .symmetry_analysis
        .map(|s| {
            Ok::<_, DecodeError>(SymmetryAnalysis {
                score: percent("symmetry_analysis.score", s.score)?,
                asymmetric_regions: s.asymmetric_regions.unwrap_or_default(),
                notes: s.notes.unwrap_or_default(),
            })
        })
        .transpose()?;

    let multi_disease_results = wire
        .multi_disease_results
        .map(|list| {
            list.into_iter()
                .map(|d| {
                    Ok::<_, DecodeError>(DiseaseResult {
                        confidence: percent("multi_disease_results.confidence", d.confidence)?,
                        disease: d.disease,
                        present: d.present,
                        findings: d.findings.unwrap_or_default(),
                    })
                })
                .collect::<Result<Vec<_>, DecodeError>>()
        })
        .transpose()?;

    let comparison_results = wire
        .comparison_results
        .map(|c| {
            let rate = c.progression_rate.unwrap_or(0.0);
            if !rate.is_finite() {
                return Err(DecodeError::OutOfRange {
                    field: "comparison_results.progression_rate",
                    value: rate.to_string(),
                });
            }
            Ok(ComparisonResults {
                changes: c.changes.unwrap_or_default(),
                progression_rate: rate as f32,
                overall_trend: c.overall_trend.unwrap_or_default(),
            })
        })
        .transpose()?;

    Ok(AnalysisResult {
        classification,
        risk_score,
        risk_level,
        confidence,
        findings: wire.findings.unwrap_or_default(),
        recommendations: wire
            .recommendations
            .unwrap_or_else(|| default_recommendations(risk_level)),
        nodule_location: non_blank(wire.nodule_location)
            .unwrap_or_else(|| NO_NODULE_LOCATION.to_string()),
        nodule_dimensions: non_blank(wire.nodule_dimensions)
            .unwrap_or_else(|| NO_NODULE_DIMENSIONS.to_string()),
        additional_observations: wire.additional_observations.unwrap_or_default(),
        patient_id: mint_patient_id(now),
        analysis_timestamp: now,
        heatmap_regions,
        detailed_report: wire.detailed_report.unwrap_or_default(),
        lung_age,
        symmetry_analysis,
        multi_disease_results,
        comparison_results,
    })
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Integer-valued number in [0, 100].
fn percent(field: &'static str, value: f64) -> Result<u8, DecodeError> {
    bounded_integer(field, value, 100.0).map(|v| v as u8)
}

fn bounded_integer(field: &'static str, value: f64, max: f64) -> Result<u64, DecodeError> {
    if !value.is_finite() || value.fract() != 0.0 || !(0.0..=max).contains(&value) {
        return Err(DecodeError::OutOfRange {
            field,
            value: value.to_string(),
        });
    }
    Ok(value as u64)
}

fn region(r: WireRegion) -> Result<HeatmapRegion, DecodeError> {
    let check = |field: &'static str, v: f64, ok: bool| {
        if v.is_finite() && ok {
            Ok(v as f32)
        } else {
            Err(DecodeError::OutOfRange {
                field,
                value: v.to_string(),
            })
        }
    };
    Ok(HeatmapRegion {
        x_percent: check("heatmap_regions.x_percent", r.x_percent, (0.0..=100.0).contains(&r.x_percent))?,
        y_percent: check("heatmap_regions.y_percent", r.y_percent, (0.0..=100.0).contains(&r.y_percent))?,
        intensity: check("heatmap_regions.intensity", r.intensity, (0.0..=1.0).contains(&r.intensity))?,
        // Radius may exceed the image; the compositor clips it
        size: check("heatmap_regions.size", r.size, r.size > 0.0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn empty_object_gets_all_defaults() {
        let r = decode_analysis(json!({}), now()).unwrap();
        assert_eq!(r.classification, Classification::Normal);
        assert_eq!(r.risk_score, 15);
        assert_eq!(r.risk_level, RiskLevel::Low);
        assert_eq!(r.confidence, 85);
        assert!(r.findings.is_empty());
        assert_eq!(r.recommendations, default_recommendations(RiskLevel::Low));
        assert_eq!(r.nodule_location, "None detected");
        assert_eq!(r.nodule_dimensions, "N/A");
        assert!(r.heatmap_regions.is_empty());
        assert_eq!(r.detailed_report, "");
        assert!(r.lung_age.is_none());
        assert_eq!(r.analysis_timestamp, now());
        assert!(r.patient_id.starts_with("PT-"));
    }

    #[test]
    fn full_payload_maps_snake_case() {
        let payload = json!({
            "classification": "Abnormal",
            "risk_score": 72,
            "confidence": 91,
            "findings": ["Spiculated nodule"],
            "recommendations": ["See a pulmonologist"],
            "nodule_location": "Left lower lobe",
            "nodule_dimensions": "2.1cm",
            "additional_observations": ["Mild cardiomegaly"],
            "heatmap_regions": [{"x_percent": 62, "y_percent": 70.5, "intensity": 0.8, "size": 10}],
            "detailed_report": "Report text",
            "lung_age": {"age": 52, "notes": "Some wear"},
            "symmetry_analysis": {"score": 64, "asymmetric_regions": ["left base"], "notes": ""},
            "multi_disease_results": [
                {"disease": "Pneumonia", "present": false, "confidence": 90, "findings": []}
            ],
            "comparison_results": {"changes": ["grew"], "progression_rate": 12.5, "overall_trend": "worsening"}
        });
        let r = decode_analysis(payload, now()).unwrap();
        assert_eq!(r.classification, Classification::Abnormal);
        assert_eq!(r.risk_level, RiskLevel::High);
        assert_eq!(r.recommendations, vec!["See a pulmonologist".to_string()]);
        assert_eq!(r.heatmap_regions[0].y_percent, 70.5);
        assert_eq!(r.lung_age.unwrap().age, 52);
        assert_eq!(r.symmetry_analysis.unwrap().asymmetric_regions, vec!["left base"]);
        assert_eq!(r.multi_disease_results.unwrap()[0].disease, "Pneumonia");
        assert_eq!(r.comparison_results.unwrap().overall_trend, "worsening");
    }

    #[test]
    fn camel_case_aliases_accepted() {
        let r = decode_analysis(
            json!({"riskScore": 40, "noduleLocation": "Right apex", "heatmapRegions": []}),
            now(),
        )
        .unwrap();
        assert_eq!(r.risk_score, 40);
        assert_eq!(r.nodule_location, "Right apex");
    }

    #[test]
    fn missing_recommendations_follow_band() {
        let r = decode_analysis(json!({"risk_score": 65}), now()).unwrap();
        assert_eq!(r.recommendations.len(), 5);
        let r = decode_analysis(json!({"risk_score": 45}), now()).unwrap();
        assert_eq!(r.recommendations.len(), 4);
    }

    #[test]
    fn explicit_zero_risk_is_kept() {
        let r = decode_analysis(json!({"risk_score": 0}), now()).unwrap();
        assert_eq!(r.risk_score, 0);
    }

    #[test]
    fn null_fields_take_defaults() {
        let r = decode_analysis(json!({"findings": null, "nodule_location": null}), now()).unwrap();
        assert!(r.findings.is_empty());
        assert_eq!(r.nodule_location, "None detected");
    }

    #[test]
    fn blank_strings_take_sentinels() {
        let r = decode_analysis(json!({"nodule_location": "  ", "classification": ""}), now()).unwrap();
        assert_eq!(r.nodule_location, "None detected");
        assert_eq!(r.classification, Classification::Normal);
    }

    #[test]
    fn classification_case_insensitive() {
        let r = decode_analysis(json!({"classification": "abnormal"}), now()).unwrap();
        assert_eq!(r.classification, Classification::Abnormal);
    }

    #[test]
    fn unknown_fields_ignored() {
        assert!(decode_analysis(json!({"model_version": "x", "extra": [1, 2]}), now()).is_ok());
    }

    #[test]
    fn rejects_unknown_classification() {
        let err = decode_analysis(json!({"classification": "Suspicious"}), now()).unwrap_err();
        assert_eq!(err, DecodeError::UnknownClassification("Suspicious".into()));
    }

    #[test]
    fn rejects_out_of_range_scores() {
        for payload in [
            json!({"risk_score": 101}),
            json!({"risk_score": -1}),
            json!({"risk_score": 50.5}),
            json!({"confidence": 250}),
        ] {
            assert!(matches!(
                decode_analysis(payload, now()),
                Err(DecodeError::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn rejects_wrong_types() {
        for payload in [
            json!({"risk_score": "high"}),
            json!({"findings": "one finding"}),
            json!({"findings": [1, 2]}),
            json!({"heatmap_regions": [{"x_percent": 10}]}),
            json!([1, 2, 3]),
            json!("text"),
        ] {
            assert!(decode_analysis(payload, now()).is_err());
        }
    }

    #[test]
    fn rejects_bad_regions() {
        let bad = |r: serde_json::Value| decode_analysis(json!({"heatmap_regions": [r]}), now());
        assert!(bad(json!({"x_percent": 120, "y_percent": 5, "intensity": 0.5, "size": 5})).is_err());
        assert!(bad(json!({"x_percent": 20, "y_percent": 5, "intensity": 1.5, "size": 5})).is_err());
        assert!(bad(json!({"x_percent": 20, "y_percent": 5, "intensity": 0.5, "size": 0})).is_err());
        assert!(bad(json!({"x_percent": 0, "y_percent": 100, "intensity": 0, "size": 100})).is_ok());
    }

    #[test]
    fn oversized_region_keeps_the_read() {
        let payload = json!({
            "classification": "Abnormal",
            "risk_score": 78,
            "heatmap_regions": [{"x_percent": 60, "y_percent": 70, "intensity": 0.8, "size": 150}]
        });
        let r = decode_analysis(payload, now()).unwrap();
        assert_eq!(r.classification, Classification::Abnormal);
        assert_eq!(r.heatmap_regions.len(), 1);
        assert_eq!(r.heatmap_regions[0].size, 150.0);
    }

    #[test]
    fn rejects_bad_extension_values() {
        assert!(decode_analysis(json!({"lung_age": {"age": -4}}), now()).is_err());
        assert!(decode_analysis(json!({"symmetry_analysis": {"score": 140}}), now()).is_err());
        assert!(decode_analysis(
            json!({"multi_disease_results": [{"disease": "TB", "present": true, "confidence": 101}]}),
            now()
        )
        .is_err());
    }
}
