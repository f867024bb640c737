//! Visibility conditions for branching questions.
//!
//! A dependent question declares the question it depends on, a threshold and
//! an explicit comparison operator. Without an operator the comparison is
//! `>=`, which is the uniform "is this question relevant" check.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::{QuestionId, ResponseValue};

/// Tolerance for equality comparisons on answer values.
const EPSILON: f64 = 1e-9;

/// Comparison between an answer and a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    #[default]
    Gte,
    Lt,
    Lte,
    InRange,
    NotInRange,
}

impl ConditionOperator {
    /// Compare `value` against `threshold` (and `threshold_max` for ranges).
    pub fn apply(self, value: f64, threshold: f64, threshold_max: Option<f64>) -> bool {
        let upper = threshold_max.unwrap_or(threshold);
        match self {
            ConditionOperator::Eq => (value - threshold).abs() < EPSILON,
            ConditionOperator::Ne => (value - threshold).abs() >= EPSILON,
            ConditionOperator::Gt => value > threshold,
            ConditionOperator::Gte => value >= threshold,
            ConditionOperator::Lt => value < threshold,
            ConditionOperator::Lte => value <= threshold,
            ConditionOperator::InRange => threshold <= value && value <= upper,
            ConditionOperator::NotInRange => !(threshold <= value && value <= upper),
        }
    }

    pub fn is_range(self) -> bool {
        matches!(
            self,
            ConditionOperator::InRange | ConditionOperator::NotInRange
        )
    }

    /// Comparison symbol for display. Range operators have none.
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            ConditionOperator::Eq => Some("=="),
            ConditionOperator::Ne => Some("!="),
            ConditionOperator::Gt => Some(">"),
            ConditionOperator::Gte => Some(">="),
            ConditionOperator::Lt => Some("<"),
            ConditionOperator::Lte => Some("<="),
            ConditionOperator::InRange | ConditionOperator::NotInRange => None,
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionOperator::Eq => "eq",
            ConditionOperator::Ne => "ne",
            ConditionOperator::Gt => "gt",
            ConditionOperator::Gte => "gte",
            ConditionOperator::Lt => "lt",
            ConditionOperator::Lte => "lte",
            ConditionOperator::InRange => "in_range",
            ConditionOperator::NotInRange => "not_in_range",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ConditionOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eq" | "==" => Ok(ConditionOperator::Eq),
            "ne" | "!=" => Ok(ConditionOperator::Ne),
            "gt" | ">" => Ok(ConditionOperator::Gt),
            "gte" | ">=" => Ok(ConditionOperator::Gte),
            "lt" | "<" => Ok(ConditionOperator::Lt),
            "lte" | "<=" => Ok(ConditionOperator::Lte),
            "in_range" => Ok(ConditionOperator::InRange),
            "not_in_range" => Ok(ConditionOperator::NotInRange),
            other => Err(format!("unknown condition operator: {other}")),
        }
    }
}

/// A resolved visibility condition of one question.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// The question whose answer is inspected.
    pub question_id: QuestionId,
    pub operator: ConditionOperator,
    /// `None` means any recorded answer satisfies the condition.
    pub threshold: Option<f64>,
    pub threshold_max: Option<f64>,
}

impl Condition {
    /// Whether `value` satisfies this condition. Non-numeric values never do.
    pub fn is_satisfied_by(&self, value: &ResponseValue) -> bool {
        let Some(value) = value.as_number() else {
            return false;
        };
        match self.threshold {
            Some(threshold) => self.operator.apply(value, threshold, self.threshold_max),
            None => true,
        }
    }

    /// Short readable form, e.g. `>= 3` or `in 2..=4`.
    pub fn describe(&self) -> String {
        let Some(threshold) = self.threshold else {
            return "answered".to_string();
        };
        let upper = self.threshold_max.unwrap_or(threshold);
        match (self.operator, self.operator.symbol()) {
            (_, Some(symbol)) => format!("{symbol} {threshold}"),
            (ConditionOperator::NotInRange, None) => format!("not in {threshold}..={upper}"),
            (_, None) => format!("in {threshold}..={upper}"),
        }
    }
}

/// The plain relevance check: satisfied iff `response_value >= threshold`.
///
/// Numeric strings are coerced; values that cannot be coerced yield `false`.
pub fn evaluate(response_value: &ResponseValue, threshold: f64) -> bool {
    response_value
        .as_number()
        .is_some_and(|v| ConditionOperator::Gte.apply(v, threshold, None))
}
