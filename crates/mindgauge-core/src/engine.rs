//! Assessment engine service facade.
//!
//! Owns admitted templates and registered attempts. Templates are validated
//! once on first use and shared read-only as `Arc<TestTemplate>`. Each attempt
//! sits behind its own mutex, so submissions for one attempt are serialised
//! while different attempts proceed independently. An attempt is sealed by
//! its first `get_results`, after which only the result is kept.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::branching::Progress;
use crate::error::EngineError;
use crate::model::{Question, QuestionId, ResponseValue, TestTemplate};
use crate::results::{self, AssessmentResult};
use crate::rules::{self, BranchingTree, ValidationReport};
use crate::session::Session;
use crate::store::TemplateStore;

/// Configuration for the assessment engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Global cap on returned recommendations, applied after the template's own.
    pub max_recommendations: Option<usize>,
}

/// What `get_question` hands back: the next question, or a completion marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionPrompt {
    Question(Question),
    Complete { complete: bool },
}

impl QuestionPrompt {
    fn from_next(next: Option<&Question>) -> Self {
        match next {
            Some(q) => QuestionPrompt::Question(q.clone()),
            None => QuestionPrompt::Complete { complete: true },
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, QuestionPrompt::Complete { .. })
    }

    pub fn question(&self) -> Option<&Question> {
        match self {
            QuestionPrompt::Question(q) => Some(q),
            QuestionPrompt::Complete { .. } => None,
        }
    }
}

/// Why a submission was turned down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: String,
    pub message: String,
}

impl From<&EngineError> for Rejection {
    fn from(e: &EngineError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

/// Result of `submit_answer` and `skip_question`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub accepted: bool,
    /// Next question to present; `None` once the attempt is complete.
    pub next: Option<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

/// Lifecycle of one registered attempt.
enum AttemptState {
    Open {
        template: Arc<TestTemplate>,
        session: Session,
    },
    /// Results were handed out. The session is archived as its result and
    /// final progress; nothing can change the attempt from here on.
    Sealed {
        result: AssessmentResult,
        progress: Progress,
    },
}

/// The assessment engine.
pub struct AssessmentEngine {
    store: Arc<dyn TemplateStore>,
    config: EngineConfig,
    admitted: RwLock<HashMap<String, Arc<TestTemplate>>>,
    attempts: RwLock<HashMap<Uuid, Arc<Mutex<AttemptState>>>>,
}

impl AssessmentEngine {
    pub fn new(store: Arc<dyn TemplateStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn TemplateStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            admitted: RwLock::new(HashMap::new()),
            attempts: RwLock::new(HashMap::new()),
        }
    }

    /// Keys of every template in the store.
    pub async fn list_templates(&self) -> Result<Vec<String>, EngineError> {
        self.store
            .keys()
            .await
            .map_err(|e| EngineError::Store(format!("{e:#}")))
    }

    /// Validate and cache a template. Invalid templates are never cached.
    pub async fn admit(&self, key: &str) -> Result<Arc<TestTemplate>, EngineError> {
        if let Some(template) = self.admitted.read().await.get(key) {
            return Ok(Arc::clone(template));
        }

        let template = self.fetch(key).await?;
        let report = rules::validate_template(&template);
        if !report.is_valid {
            tracing::warn!(template = key, errors = ?report.errors, "template rejected");
            return Err(EngineError::TemplateValidation {
                key: key.to_string(),
                errors: report.errors,
            });
        }
        for warning in &report.warnings {
            tracing::warn!(template = key, question = ?warning.question_id, "{}", warning.message);
        }

        let template = Arc::clone(
            self.admitted
                .write()
                .await
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(template)),
        );
        tracing::info!(template = key, questions = template.questions.len(), "template admitted");
        Ok(template)
    }

    /// Start a new attempt.
    pub async fn start(&self, template_key: &str) -> Result<Uuid, EngineError> {
        let template = self.admit(template_key).await?;
        let session = Session::start(&template);
        let attempt_id = session.attempt_id;

        self.insert_attempt(template, session).await?;
        tracing::info!(attempt = %attempt_id, template = template_key, "attempt started");
        Ok(attempt_id)
    }

    /// The question to present next.
    pub async fn get_question(&self, attempt_id: Uuid) -> Result<QuestionPrompt, EngineError> {
        let attempt = self.attempt(attempt_id).await?;
        let state = attempt.lock().await;
        Ok(match &*state {
            AttemptState::Open { template, session } => {
                QuestionPrompt::from_next(session.current_question(template))
            }
            AttemptState::Sealed { .. } => QuestionPrompt::Complete { complete: true },
        })
    }

    /// Submit an answer.
    ///
    /// Recoverable failures come back as `accepted: false` with the attempt
    /// unchanged; only a missing attempt is an error.
    pub async fn submit_answer(
        &self,
        attempt_id: Uuid,
        question_id: QuestionId,
        value: impl Into<ResponseValue>,
    ) -> Result<SubmitOutcome, EngineError> {
        self.submit_timed(attempt_id, question_id, value, None).await
    }

    /// Submit an answer with the time the respondent took.
    pub async fn submit_timed(
        &self,
        attempt_id: Uuid,
        question_id: QuestionId,
        value: impl Into<ResponseValue>,
        response_time_ms: Option<u64>,
    ) -> Result<SubmitOutcome, EngineError> {
        let value = value.into();
        self.mutate(attempt_id, |template, session| {
            session
                .answer_timed(template, question_id, value, response_time_ms)
                .map(|next| next.cloned())
        })
        .await
    }

    /// Skip an optional question.
    pub async fn skip_question(
        &self,
        attempt_id: Uuid,
        question_id: QuestionId,
    ) -> Result<SubmitOutcome, EngineError> {
        self.mutate(attempt_id, |template, session| {
            session
                .skip(template, question_id)
                .map(|next| next.cloned())
        })
        .await
    }

    /// Withdraw the most recent response.
    pub async fn previous_question(&self, attempt_id: Uuid) -> Result<QuestionPrompt, EngineError> {
        let attempt = self.attempt(attempt_id).await?;
        let mut state = attempt.lock().await;
        match &mut *state {
            AttemptState::Open { template, session } => Ok(QuestionPrompt::from_next(
                session.previous_question(template),
            )),
            AttemptState::Sealed { .. } => Err(EngineError::AttemptComplete),
        }
    }

    pub async fn get_progress(&self, attempt_id: Uuid) -> Result<Progress, EngineError> {
        let attempt = self.attempt(attempt_id).await?;
        let state = attempt.lock().await;
        Ok(match &*state {
            AttemptState::Open { template, session } => session.progress(template),
            AttemptState::Sealed { progress, .. } => progress.clone(),
        })
    }

    /// Results of a completed attempt.
    ///
    /// The first call seals the attempt: its session is dropped and only the
    /// result and final progress are kept.
    pub async fn get_results(&self, attempt_id: Uuid) -> Result<AssessmentResult, EngineError> {
        let attempt = self.attempt(attempt_id).await?;
        let mut state = attempt.lock().await;
        let (result, progress) = match &*state {
            AttemptState::Sealed { result, .. } => return Ok(result.clone()),
            AttemptState::Open { template, session } => {
                let mut result = results::evaluate(template, session)?;
                if let Some(cap) = self.config.max_recommendations {
                    result.recommendations.truncate(cap);
                }
                (result, session.progress(template))
            }
        };

        *state = AttemptState::Sealed {
            result: result.clone(),
            progress,
        };
        tracing::debug!(attempt = %attempt_id, "attempt sealed");
        Ok(result)
    }

    /// Forget an attempt. Returns its result if it had been sealed.
    pub async fn discard_attempt(
        &self,
        attempt_id: Uuid,
    ) -> Result<Option<AssessmentResult>, EngineError> {
        let attempt = self
            .attempts
            .write()
            .await
            .remove(&attempt_id)
            .ok_or(EngineError::UnknownAttempt(attempt_id))?;
        let state = attempt.lock().await;
        tracing::debug!(attempt = %attempt_id, "attempt discarded");
        Ok(match &*state {
            AttemptState::Sealed { result, .. } => Some(result.clone()),
            AttemptState::Open { .. } => None,
        })
    }

    /// Rule validation of a stored template. Invalid templates are reported,
    /// not raised.
    pub async fn validate_template(&self, template_key: &str) -> Result<ValidationReport, EngineError> {
        let template = self.fetch(template_key).await?;
        Ok(rules::validate_template(&template))
    }

    pub async fn get_branching_tree(&self, template_key: &str) -> Result<BranchingTree, EngineError> {
        let template = self.fetch(template_key).await?;
        Ok(rules::branching_tree(&template))
    }

    /// Snapshot of an open attempt's session, for persistence by the caller.
    /// Sealed attempts no longer hold one.
    pub async fn export_session(&self, attempt_id: Uuid) -> Result<Session, EngineError> {
        let attempt = self.attempt(attempt_id).await?;
        let state = attempt.lock().await;
        match &*state {
            AttemptState::Open { session, .. } => Ok(session.clone()),
            AttemptState::Sealed { .. } => Err(EngineError::AttemptComplete),
        }
    }

    /// Re-register a previously exported session.
    ///
    /// Every response is re-validated and visibility is recomputed against
    /// the current template. The attempt id must not already be registered.
    pub async fn resume_session(&self, mut session: Session) -> Result<Uuid, EngineError> {
        let template = self.admit(&session.template_key).await?;
        session.restore(&template)?;
        let attempt_id = session.attempt_id;

        self.insert_attempt(template, session).await?;
        tracing::info!(attempt = %attempt_id, "attempt resumed");
        Ok(attempt_id)
    }

    async fn fetch(&self, key: &str) -> Result<TestTemplate, EngineError> {
        self.store
            .fetch(key)
            .await
            .map_err(|e| EngineError::Store(format!("{e:#}")))?
            .ok_or_else(|| EngineError::UnknownTemplate(key.to_string()))
    }

    async fn insert_attempt(
        &self,
        template: Arc<TestTemplate>,
        session: Session,
    ) -> Result<(), EngineError> {
        let attempt_id = session.attempt_id;
        match self.attempts.write().await.entry(attempt_id) {
            Entry::Occupied(_) => Err(EngineError::AttemptExists(attempt_id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(AttemptState::Open { template, session })));
                Ok(())
            }
        }
    }

    async fn attempt(&self, attempt_id: Uuid) -> Result<Arc<Mutex<AttemptState>>, EngineError> {
        self.attempts
            .read()
            .await
            .get(&attempt_id)
            .cloned()
            .ok_or(EngineError::UnknownAttempt(attempt_id))
    }

    async fn mutate<F>(&self, attempt_id: Uuid, op: F) -> Result<SubmitOutcome, EngineError>
    where
        F: FnOnce(&TestTemplate, &mut Session) -> Result<Option<Question>, EngineError>,
    {
        let attempt = self.attempt(attempt_id).await?;
        let mut state = attempt.lock().await;

        let (outcome, current) = match &mut *state {
            AttemptState::Open { template, session } => {
                let outcome = op(template, session);
                (outcome, session.current_question(template).cloned())
            }
            AttemptState::Sealed { .. } => (Err(EngineError::AttemptComplete), None),
        };

        match outcome {
            Ok(next) => Ok(SubmitOutcome {
                accepted: true,
                next,
                rejection: None,
            }),
            Err(e) if e.is_recoverable() => {
                tracing::debug!(attempt = %attempt_id, error = %e, "submission rejected");
                Ok(SubmitOutcome {
                    accepted: false,
                    next: current,
                    rejection: Some(Rejection::from(&e)),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTemplateStore;

    fn engine() -> AssessmentEngine {
        AssessmentEngine::new(Arc::new(InMemoryTemplateStore::with_builtin()))
    }

    #[tokio::test]
    async fn unknown_template_and_attempt() {
        let engine = engine();
        assert!(matches!(
            engine.start("nope").await.unwrap_err(),
            EngineError::UnknownTemplate(_)
        ));
        let id = Uuid::new_v4();
        assert!(matches!(
            engine.get_question(id).await.unwrap_err(),
            EngineError::UnknownAttempt(_)
        ));
        assert!(matches!(
            engine.submit_answer(id, 1, 3).await.unwrap_err(),
            EngineError::UnknownAttempt(_)
        ));
    }

    #[tokio::test]
    async fn admission_is_cached() {
        let engine = engine();
        let a = engine.admit("who5").await.unwrap();
        let b = engine.admit("who5").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn rejected_submission_reports_code() {
        let engine = engine();
        let id = engine.start("who5").await.unwrap();
        let outcome = engine.submit_answer(id, 1, 9).await.unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.rejection.unwrap().code, "invalid_response");
        assert_eq!(outcome.next.map(|q| q.id), Some(1));
    }

    #[tokio::test]
    async fn sealing_archives_the_session() {
        let engine = engine();
        let id = engine.start("who5").await.unwrap();
        for question in 1..=5 {
            engine.submit_answer(id, question, 3).await.unwrap();
        }
        let result = engine.get_results(id).await.unwrap();

        let attempt = engine.attempt(id).await.unwrap();
        assert!(matches!(&*attempt.lock().await, AttemptState::Sealed { .. }));
        assert!(matches!(
            engine.export_session(id).await.unwrap_err(),
            EngineError::AttemptComplete
        ));
        assert_eq!(engine.get_progress(id).await.unwrap().percentage, 100);
        assert_eq!(engine.get_results(id).await.unwrap(), result);

        assert_eq!(engine.discard_attempt(id).await.unwrap(), Some(result));
        assert!(matches!(
            engine.get_question(id).await.unwrap_err(),
            EngineError::UnknownAttempt(_)
        ));
    }

    #[tokio::test]
    async fn open_attempt_can_be_discarded() {
        let engine = engine();
        let id = engine.start("who5").await.unwrap();
        assert_eq!(engine.discard_attempt(id).await.unwrap(), None);
        assert!(matches!(
            engine.discard_attempt(id).await.unwrap_err(),
            EngineError::UnknownAttempt(_)
        ));
    }

    #[tokio::test]
    async fn prompt_serializes_as_question_or_marker() {
        let complete = serde_json::to_value(QuestionPrompt::Complete { complete: true }).unwrap();
        assert_eq!(complete, serde_json::json!({"complete": true}));

        let engine = engine();
        let id = engine.start("who5").await.unwrap();
        let prompt = engine.get_question(id).await.unwrap();
        let json = serde_json::to_value(&prompt).unwrap();
        assert_eq!(json["id"], 1);
        assert!(!prompt.is_complete());
    }
}
