//! Engine error types.
//!
//! Answer-level errors (`InvalidResponse`, `AttemptComplete`,
//! `CannotSkipRequired`) are recoverable: the session is left untouched and
//! the caller may retry. `TemplateValidation` is raised when a template is
//! admitted, before any attempt can observe it.

use thiserror::Error;
use uuid::Uuid;

use crate::model::QuestionId;

/// Errors raised by the assessment engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The answer is outside the question's declared type or range.
    #[error("invalid response for question {question_id}: {reason}")]
    InvalidResponse {
        question_id: QuestionId,
        reason: String,
    },

    /// An answer was submitted after the attempt finished.
    #[error("attempt is already complete")]
    AttemptComplete,

    /// A required question cannot be skipped.
    #[error("question {0} is required and cannot be skipped")]
    CannotSkipRequired(QuestionId),

    /// The template failed rule validation and cannot be served.
    #[error("template '{key}' failed validation: {}", errors.join("; "))]
    TemplateValidation { key: String, errors: Vec<String> },

    /// The question id does not exist in the template.
    #[error("question {0} does not exist in this template")]
    UnknownQuestion(QuestionId),

    /// The question exists but is not currently visible.
    #[error("question {0} is not visible given the current answers")]
    QuestionNotVisible(QuestionId),

    /// Results were requested before the attempt finished.
    #[error("attempt is not complete: {remaining} visible question(s) still open")]
    AttemptIncomplete { remaining: usize },

    #[error("template not found: {0}")]
    UnknownTemplate(String),

    #[error("attempt not found: {0}")]
    UnknownAttempt(Uuid),

    /// A resumed session reuses the id of a registered attempt.
    #[error("attempt already registered: {0}")]
    AttemptExists(Uuid),

    /// The template store failed.
    #[error("template store error: {0}")]
    Store(String),
}

impl EngineError {
    /// Returns `true` if the caller can recover by retrying with different input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidResponse { .. }
                | EngineError::AttemptComplete
                | EngineError::CannotSkipRequired(_)
                | EngineError::UnknownQuestion(_)
                | EngineError::QuestionNotVisible(_)
                | EngineError::AttemptIncomplete { .. }
        )
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidResponse { .. } => "invalid_response",
            EngineError::AttemptComplete => "attempt_complete",
            EngineError::CannotSkipRequired(_) => "cannot_skip_required",
            EngineError::TemplateValidation { .. } => "template_validation",
            EngineError::UnknownQuestion(_) => "unknown_question",
            EngineError::QuestionNotVisible(_) => "question_not_visible",
            EngineError::AttemptIncomplete { .. } => "attempt_incomplete",
            EngineError::UnknownTemplate(_) => "unknown_template",
            EngineError::UnknownAttempt(_) => "unknown_attempt",
            EngineError::AttemptExists(_) => "attempt_exists",
            EngineError::Store(_) => "store",
        }
    }
}

/// Interpretation lookup failures. Logged and replaced by a fallback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpretationError {
    #[error("no score range contains {score}")]
    UnknownScoreRange { score: f64 },
}
