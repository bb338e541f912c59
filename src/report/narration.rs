//! Spoken summary of a result. The browser's speech engine reads the script;
//! this side only decides what is said.

use serde::Serialize;

use super::Narrator;
use crate::models::AnalysisResult;

/// Recommendations read aloud, from the top of the list.
const SPOKEN_RECOMMENDATIONS: usize = 3;

pub const NARRATION_CLOSING: &str = "Please note: This analysis is for informational purposes only. Consult a healthcare professional for medical advice.";

/// Voice settings handed to the browser with the script.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationScript {
    pub text: String,
    pub lang: &'static str,
    pub rate: f32,
    pub pitch: f32,
}

impl NarrationScript {
    /// Wrap a script with the default voice settings.
    pub fn new(text: String) -> Self {
        Self {
            text,
            lang: "en-US",
            rate: 0.9,
            pitch: 1.0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptNarrator;

impl Narrator for ScriptNarrator {
    fn script(&self, result: &AnalysisResult) -> String {
        let mut text = String::from("Analysis complete. ");
        text.push_str(&format!("Classification: {}. ", result.classification));
        text.push_str(&format!(
            "Risk score is {} percent, indicating {} probability. ",
            result.risk_score,
            result.risk_level.as_str().to_lowercase()
        ));

        if result.findings.is_empty() {
            text.push_str("No significant abnormalities detected. ");
        } else {
            text.push_str(&format!(
                "The scan shows the following findings: {}. ",
                result.findings.join(". ")
            ));
        }

        if result.has_nodule() {
            text.push_str(&format!("{}. ", result.nodule_location));
        }

        if !result.recommendations.is_empty() {
            let spoken: Vec<&str> = result
                .recommendations
                .iter()
                .take(SPOKEN_RECOMMENDATIONS)
                .map(String::as_str)
                .collect();
            text.push_str(&format!("Recommendations: {}. ", spoken.join(". ")));
        }

        text.push_str(NARRATION_CLOSING);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analysis::fixtures::{abnormal_result, normal_result};

    #[test]
    fn normal_script() {
        let script = ScriptNarrator.script(&normal_result());
        assert_eq!(
            script,
            "Analysis complete. Classification: Normal. \
             Risk score is 12 percent, indicating low probability. \
             No significant abnormalities detected. \
             Recommendations: Continue routine screening as per guidelines. \
             Please note: This analysis is for informational purposes only. \
             Consult a healthcare professional for medical advice."
        );
    }

    #[test]
    fn abnormal_script_mentions_location() {
        let script = ScriptNarrator.script(&abnormal_result());
        assert!(script.contains("indicating high probability"));
        assert!(script.contains("following findings: Solid pulmonary nodule detected. "));
        assert!(script.contains("Right upper lobe. "));
        assert!(script.ends_with(NARRATION_CLOSING));
    }

    #[test]
    fn only_first_three_recommendations_are_read() {
        let mut result = abnormal_result();
        result.recommendations = vec!["A".into(), "B".into(), "C".into(), "D".into()];
        let script = ScriptNarrator.script(&result);
        assert!(script.contains("Recommendations: A. B. C. "));
        assert!(!script.contains("D. "));
    }

    #[test]
    fn no_recommendations_section_when_empty() {
        let mut result = normal_result();
        result.recommendations.clear();
        assert!(!ScriptNarrator.script(&result).contains("Recommendations:"));
    }

    #[test]
    fn narrate_carries_voice_settings() {
        let n = NarrationScript::new(ScriptNarrator.script(&normal_result()));
        assert_eq!(n.lang, "en-US");
        assert_eq!(n.rate, 0.9);
        let json = serde_json::to_value(&n).unwrap();
        assert!(json["text"].as_str().unwrap().starts_with("Analysis complete."));
    }
}
