use chrono::{DateTime, Utc};

use crate::models::{Classification, RiskLevel};
use crate::pipeline::cache::to_base36_upper;

pub const DEFAULT_CLASSIFICATION: Classification = Classification::Normal;
pub const DEFAULT_RISK_SCORE: u8 = 15;
pub const DEFAULT_CONFIDENCE: u8 = 85;

/// Follow-up advice used when the service sends none.
pub fn default_recommendations(level: RiskLevel) -> Vec<String> {
    let items: &[&str] = match level {
        RiskLevel::Low => &[
            "No immediate concerns identified",
            "Continue routine screening as per guidelines",
            "Follow up with annual chest X-ray as appropriate",
        ],
        RiskLevel::Medium => &[
            "Follow-up imaging recommended in 3-6 months",
            "Consider pulmonology consultation",
            "Review clinical history and risk factors",
            "Compare with prior imaging if available",
        ],
        RiskLevel::High => &[
            "Urgent follow-up with contrast-enhanced CT recommended",
            "Immediate pulmonology referral advised",
            "Consider PET-CT for further characterization",
            "Multidisciplinary tumor board review recommended",
            "Patient counseling regarding findings and next steps",
        ],
    };
    items.iter().map(|s| s.to_string()).collect()
}

/// Synthetic patient token: `PT-` + upper-case base-36 epoch milliseconds.
/// Carries no patient data.
pub fn mint_patient_id(now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    format!("PT-{}", to_base36_upper(millis))
}
