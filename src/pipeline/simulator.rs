//! What-if risk reduction from lifestyle changes.

use serde::{Deserialize, Serialize};

/// Relative risk reduction per smoke-free month.
const SMOKING_REDUCTION_PER_MONTH: f64 = 0.02;
/// Smoking cessation never takes more than half the risk off.
const SMOKING_FACTOR_FLOOR: f64 = 0.5;
/// Full pollution avoidance removes at most 30% of the risk.
const MAX_POLLUTION_REDUCTION: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    pub smoking_factor: f64,
    pub pollution_factor: f64,
    pub simulated_risk: u32,
    /// Percentage of the current risk removed.
    pub reduction_pct: u32,
}

/// Project the risk after `months_smoke_free` and a `pollution_reduction_pct`
/// (0-100) cut in exposure. Returns `None` when `current_risk` is 0, since no
/// reduction percentage exists.
pub fn simulate(
    current_risk: u32,
    months_smoke_free: u32,
    pollution_reduction_pct: f64,
) -> Option<SimulationOutcome> {
    if current_risk == 0 {
        return None;
    }

    let pollution_pct = pollution_reduction_pct.clamp(0.0, 100.0);
    let smoking_factor = (1.0 - f64::from(months_smoke_free) * SMOKING_REDUCTION_PER_MONTH)
        .max(SMOKING_FACTOR_FLOOR);
    let pollution_factor = 1.0 - pollution_pct / 100.0 * MAX_POLLUTION_REDUCTION;

    let current = f64::from(current_risk);
    let simulated = (current * smoking_factor * pollution_factor).round();
    let reduction = ((current - simulated) / current * 100.0).round();

    Some(SimulationOutcome {
        smoking_factor,
        pollution_factor,
        simulated_risk: simulated as u32,
        reduction_pct: reduction as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worked_example() {
        let out = simulate(80, 12, 50.0).unwrap();
        assert!((out.smoking_factor - 0.76).abs() < 1e-9);
        assert!((out.pollution_factor - 0.85).abs() < 1e-9);
        assert_eq!(out.simulated_risk, 52);
        assert_eq!(out.reduction_pct, 35);
    }

    #[test]
    fn no_change_keeps_risk() {
        let out = simulate(40, 0, 0.0).unwrap();
        assert_eq!(out.simulated_risk, 40);
        assert_eq!(out.reduction_pct, 0);
    }

    #[test]
    fn smoking_factor_floors_at_half() {
        assert_eq!(simulate(60, 25, 0.0).unwrap().smoking_factor, 0.5);
        assert_eq!(simulate(60, 120, 0.0).unwrap().smoking_factor, 0.5);
        assert_eq!(simulate(60, 120, 0.0).unwrap().simulated_risk, 30);
    }

    #[test]
    fn maximal_changes() {
        // 0.5 * 0.7 = 0.35
        let out = simulate(100, 36, 100.0).unwrap();
        assert_eq!(out.simulated_risk, 35);
        assert_eq!(out.reduction_pct, 65);
    }

    #[test]
    fn pollution_input_is_clamped() {
        assert_eq!(simulate(50, 0, 250.0), simulate(50, 0, 100.0));
        assert_eq!(simulate(50, 0, -10.0), simulate(50, 0, 0.0));
    }

    #[test]
    fn zero_risk_is_guarded() {
        assert!(simulate(0, 12, 50.0).is_none());
    }
}
