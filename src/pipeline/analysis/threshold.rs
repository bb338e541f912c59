use crate::models::{AnalysisResult, Classification, RiskLevel};

/// Abnormal calls below this confidence are downgraded.
pub const ABNORMAL_CONFIDENCE_FLOOR: u8 = 70;

/// Risk ceiling for a downgraded call.
pub const INCONCLUSIVE_RISK_CAP: u8 = 45;

/// Recommendations placed ahead of the originals on a downgrade.
pub const INCONCLUSIVE_RECOMMENDATIONS: [&str; 2] = [
    "Findings are inconclusive - recommend professional radiologist review",
    "Consider repeat imaging with higher quality",
];

/// How many original recommendations survive a downgrade.
const KEPT_RECOMMENDATIONS: usize = 2;

/// Downgrade a low-confidence Abnormal call to Inconclusive.
///
/// Returns the (possibly rewritten) result and whether a downgrade happened.
/// Anything that is not an Abnormal call under the floor passes through as is.
pub fn apply_confidence_threshold(mut result: AnalysisResult) -> (AnalysisResult, bool) {
    if result.classification != Classification::Abnormal
        || result.confidence >= ABNORMAL_CONFIDENCE_FLOOR
    {
        return (result, false);
    }

    let mut recommendations: Vec<String> = INCONCLUSIVE_RECOMMENDATIONS
        .iter()
        .map(|s| s.to_string())
        .collect();
    recommendations.extend(result.recommendations.drain(..).take(KEPT_RECOMMENDATIONS));

    result.classification = Classification::Inconclusive;
    result.risk_score = result.risk_score.min(INCONCLUSIVE_RISK_CAP);
    result.risk_level = RiskLevel::Medium;
    result.recommendations = recommendations;
    (result, true)
}
