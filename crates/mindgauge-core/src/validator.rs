//! Response validation.
//!
//! Checks a candidate answer against a question's declared type and bounds
//! before the session accepts it.

use crate::error::EngineError;
use crate::model::{Question, QuestionType, ResponseValue};

/// Validate `value` for `question`, returning its numeric form.
///
/// Choice questions take an option index; the option label is accepted too
/// and resolved to its index. Boolean questions take `0`/`1` or
/// `true`/`false`/`yes`/`no`.
pub fn validate_response(question: &Question, value: &ResponseValue) -> Result<f64, EngineError> {
    let invalid = |reason: String| EngineError::InvalidResponse {
        question_id: question.id,
        reason,
    };

    let numeric = match (question.question_type, value) {
        (QuestionType::Choice, ResponseValue::Text(label)) if value.as_number().is_none() => {
            let label = label.trim();
            question
                .options
                .iter()
                .position(|o| o.eq_ignore_ascii_case(label))
                .map(|i| i as f64)
                .ok_or_else(|| invalid(format!("'{label}' is not one of the options")))?
        }
        (QuestionType::Boolean, ResponseValue::Text(text)) if value.as_number().is_none() => {
            match text.trim().to_lowercase().as_str() {
                "true" | "yes" => 1.0,
                "false" | "no" => 0.0,
                other => return Err(invalid(format!("'{other}' is not a yes/no answer"))),
            }
        }
        _ => value
            .as_number()
            .ok_or_else(|| invalid(format!("'{value}' is not a number")))?,
    };

    let (min, max) = question.bounds();
    match question.question_type {
        QuestionType::Choice | QuestionType::Boolean | QuestionType::Likert => {
            if numeric.fract() != 0.0 {
                return Err(invalid(format!(
                    "{numeric} is not a whole number; {} answers take discrete points",
                    question.question_type
                )));
            }
        }
        QuestionType::Scale => {}
    }

    if numeric < min || numeric > max {
        return Err(invalid(format!(
            "{numeric} is outside the allowed range [{min}, {max}]"
        )));
    }

    Ok(numeric)
}
