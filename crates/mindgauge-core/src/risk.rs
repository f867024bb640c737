//! Risk assessor.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{IndicatorMode, QuestionId, Response, RiskIndicator, RiskLevel};

/// Overall risk and the indicators that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Names of fired indicators, in evaluation order.
    pub fired: Vec<String>,
}

/// Evaluate `indicators` against `responses`.
///
/// A fired `high` indicator ends the evaluation: nothing after it can change
/// the outcome. Otherwise the level is the highest among fired indicators,
/// `low` when none fire.
pub fn assess(indicators: &[RiskIndicator], responses: &[Response]) -> RiskAssessment {
    let values: HashMap<QuestionId, f64> = responses
        .iter()
        .filter_map(|r| r.numeric_value().map(|v| (r.question_id, v)))
        .collect();

    let mut assessment = RiskAssessment::default();
    for indicator in indicators {
        if !fires(indicator, &values) {
            continue;
        }
        tracing::debug!(indicator = %indicator.name, level = %indicator.risk_level, "risk indicator fired");
        assessment.fired.push(indicator.name.clone());

        if indicator.risk_level == RiskLevel::High {
            assessment.level = RiskLevel::High;
            break;
        }
        assessment.level = assessment.level.max(indicator.risk_level);
    }
    assessment
}

/// Whether one indicator fires for the answered values.
pub fn fires(indicator: &RiskIndicator, values: &HashMap<QuestionId, f64>) -> bool {
    if indicator.question_ids.is_empty() || indicator.thresholds.is_empty() {
        return false;
    }

    let mut hits = indicator
        .question_ids
        .iter()
        .enumerate()
        .map(|(i, id)| match (values.get(id), indicator.threshold_at(i)) {
            (Some(value), Some(threshold)) => indicator.operator.apply(*value, threshold, None),
            _ => false,
        });

    match indicator.mode {
        IndicatorMode::Any => hits.any(|hit| hit),
        IndicatorMode::All => hits.all(|hit| hit),
    }
}
