//! Attempt sessions.
//!
//! A [`Session`] is the explicit, serializable state of one user's pass
//! through one template. Every operation takes the template by reference;
//! the session never caches visibility decisions, it only mirrors them into
//! [`BranchingState`] after each mutation.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::branching::{self, Progress, Visibility};
use crate::error::EngineError;
use crate::model::{Question, QuestionId, Response, ResponseValue, TestTemplate};
use crate::validator::validate_response;

/// Branching bookkeeping mirrored from the last resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchingState {
    /// Resolved condition outcome per conditional question.
    #[serde(default)]
    pub condition_results: BTreeMap<QuestionId, bool>,
    /// Questions hidden, pending, or explicitly skipped.
    #[serde(default)]
    pub skipped_questions: BTreeSet<QuestionId>,
    /// Satisfied conditional edges as `"fromId->toId"`.
    #[serde(default)]
    pub traversed_edges: Vec<String>,
}

/// One user's attempt at one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub attempt_id: Uuid,
    pub template_key: String,
    /// Responses in submission order, at most one per question.
    #[serde(default)]
    pub responses: Vec<Response>,
    /// Index into the visible question sequence.
    #[serde(default)]
    pub current_question: usize,
    #[serde(default)]
    pub branching_state: BranchingState,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Start a fresh attempt.
    pub fn start(template: &TestTemplate) -> Self {
        let mut session = Self {
            attempt_id: Uuid::new_v4(),
            template_key: template.key.clone(),
            responses: Vec::new(),
            current_question: 0,
            branching_state: BranchingState::default(),
            started_at: Utc::now(),
            completed_at: None,
        };
        session.sync(template);
        session
    }

    /// The recorded response for a question.
    pub fn response(&self, question_id: QuestionId) -> Option<&Response> {
        self.responses.iter().find(|r| r.question_id == question_id)
    }

    pub fn current_question<'t>(&self, template: &'t TestTemplate) -> Option<&'t Question> {
        branching::current_question(template, self)
    }

    pub fn is_complete(&self, template: &TestTemplate) -> bool {
        branching::is_complete(template, self)
    }

    pub fn progress(&self, template: &TestTemplate) -> Progress {
        branching::progress(template, self)
    }

    /// Answer a visible question. Returns the next question to present.
    pub fn answer<'t>(
        &mut self,
        template: &'t TestTemplate,
        question_id: QuestionId,
        value: impl Into<ResponseValue>,
    ) -> Result<Option<&'t Question>, EngineError> {
        self.answer_timed(template, question_id, value, None)
    }

    /// Answer a visible question, recording how long the respondent took.
    pub fn answer_timed<'t>(
        &mut self,
        template: &'t TestTemplate,
        question_id: QuestionId,
        value: impl Into<ResponseValue>,
        response_time_ms: Option<u64>,
    ) -> Result<Option<&'t Question>, EngineError> {
        let question = self.check_open(template, question_id)?;
        let numeric = validate_response(question, &value.into())?;

        let response = Response {
            question_id,
            value: ResponseValue::Number(numeric),
            response_time_ms,
            skipped: false,
        };
        self.upsert(response);
        tracing::debug!(attempt = %self.attempt_id, question_id, value = numeric, "answer recorded");

        self.sync(template);
        Ok(self.current_question(template))
    }

    /// Skip an optional visible question. Returns the next question.
    pub fn skip<'t>(
        &mut self,
        template: &'t TestTemplate,
        question_id: QuestionId,
    ) -> Result<Option<&'t Question>, EngineError> {
        let question = self.check_open(template, question_id)?;
        if question.required {
            return Err(EngineError::CannotSkipRequired(question_id));
        }

        self.upsert(Response::skipped(question_id));
        tracing::debug!(attempt = %self.attempt_id, question_id, "question skipped");

        self.sync(template);
        Ok(self.current_question(template))
    }

    /// Undo the most recent response so it can be given again.
    ///
    /// Visibility is recomputed from scratch, so questions that depended on
    /// the withdrawn answer return to pending.
    pub fn previous_question<'t>(&mut self, template: &'t TestTemplate) -> Option<&'t Question> {
        if let Some(withdrawn) = self.responses.pop() {
            tracing::debug!(
                attempt = %self.attempt_id,
                question_id = withdrawn.question_id,
                "response withdrawn"
            );
        }
        self.sync(template);
        self.current_question(template)
    }

    /// Check a session restored from outside the engine against its
    /// template, then recompute its bookkeeping.
    ///
    /// Every response must name a template question at most once and pass
    /// the same validation a live answer would; skipped responses must be
    /// for optional questions. Accepted values are stored in numeric form.
    pub fn restore(&mut self, template: &TestTemplate) -> Result<(), EngineError> {
        let mut seen = HashSet::new();
        for response in &mut self.responses {
            let question_id = response.question_id;
            let question = template
                .question(question_id)
                .ok_or(EngineError::UnknownQuestion(question_id))?;
            if !seen.insert(question_id) {
                return Err(EngineError::InvalidResponse {
                    question_id,
                    reason: "question is answered more than once".to_string(),
                });
            }
            if response.skipped {
                if question.required {
                    return Err(EngineError::CannotSkipRequired(question_id));
                }
                continue;
            }
            let numeric = validate_response(question, &response.value)?;
            response.value = ResponseValue::Number(numeric);
        }
        self.sync(template);
        Ok(())
    }

    /// Responses to questions that are currently visible.
    pub fn effective_responses(&self, template: &TestTemplate) -> Vec<Response> {
        let resolution = branching::resolve(template, &self.responses);
        self.responses
            .iter()
            .filter(|r| {
                resolution
                    .states
                    .get(&r.question_id)
                    .is_some_and(|s| s.is_visible())
            })
            .cloned()
            .collect()
    }

    /// Recompute the pointer and branching bookkeeping after a mutation.
    pub fn sync(&mut self, template: &TestTemplate) {
        let resolution = branching::resolve(template, &self.responses);

        let mut state = BranchingState::default();
        for question in &template.questions {
            let Some(visibility) = resolution.states.get(&question.id) else {
                continue;
            };
            match visibility {
                Visibility::Shown => {
                    state.condition_results.insert(question.id, true);
                }
                Visibility::Hidden => {
                    if question.is_conditional() {
                        state.condition_results.insert(question.id, false);
                    }
                    state.skipped_questions.insert(question.id);
                }
                Visibility::Pending => {
                    state.skipped_questions.insert(question.id);
                }
                Visibility::Always => {}
            }
        }
        for response in self.responses.iter().filter(|r| r.skipped) {
            state.skipped_questions.insert(response.question_id);
        }
        state.traversed_edges = resolution
            .traversed
            .iter()
            .map(|(from, to)| format!("{from}->{to}"))
            .collect();

        self.current_question = branching::next_open_question(&resolution.visible, &self.responses)
            .map(|(i, _)| i)
            .unwrap_or(resolution.visible.len());
        self.branching_state = state;

        if branching::is_complete(template, self) {
            if self.completed_at.is_none() {
                self.completed_at = Some(Utc::now());
                tracing::info!(attempt = %self.attempt_id, template = %self.template_key, "attempt complete");
            }
        } else {
            self.completed_at = None;
        }
    }

    fn check_open<'t>(
        &self,
        template: &'t TestTemplate,
        question_id: QuestionId,
    ) -> Result<&'t Question, EngineError> {
        if self.current_question(template).is_none() {
            return Err(EngineError::AttemptComplete);
        }
        let question = template
            .question(question_id)
            .ok_or(EngineError::UnknownQuestion(question_id))?;
        let visible = branching::visible_questions(template, &self.responses);
        if !visible.iter().any(|q| q.id == question_id) {
            return Err(EngineError::QuestionNotVisible(question_id));
        }
        Ok(question)
    }

    /// Replace any earlier response to the same question and move it to the
    /// end, keeping `responses` in submission order.
    fn upsert(&mut self, response: Response) {
        self.responses.retain(|r| r.question_id != response.question_id);
        self.responses.push(response);
    }
}
