//! Branching controller.
//!
//! Decides which questions are visible for a response history, which
//! question comes next and whether an attempt is complete. Nothing is cached:
//! visibility is recomputed from the full response list on every call, so a
//! revised answer re-opens or hides dependent questions immediately.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{Question, QuestionId, Response, TestTemplate};
use crate::session::Session;

/// Visibility state of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// No condition attached.
    Always,
    /// Condition resolved and satisfied.
    Shown,
    /// Condition resolved and unmet (or its controlling question is hidden).
    Hidden,
    /// Controlling question not answered yet. Not visible, but not hidden either.
    Pending,
}

impl Visibility {
    pub fn is_visible(self) -> bool {
        matches!(self, Visibility::Always | Visibility::Shown)
    }
}

/// Full visibility picture for one response history.
#[derive(Debug, Clone)]
pub struct Resolution<'t> {
    /// Visible questions in canonical order.
    pub visible: Vec<&'t Question>,
    /// State of every question in the template.
    pub states: BTreeMap<QuestionId, Visibility>,
    /// Conditional edges `(from, to)` whose condition is satisfied.
    pub traversed: Vec<(QuestionId, QuestionId)>,
}

/// Resolve visibility of every question of `template` given `responses`.
pub fn resolve<'t>(template: &'t TestTemplate, responses: &[Response]) -> Resolution<'t> {
    let index: HashMap<QuestionId, &Question> =
        template.questions.iter().map(|q| (q.id, q)).collect();
    let latest = latest_responses(responses);

    let mut memo = HashMap::new();
    let mut visiting = HashSet::new();
    let ordered = template.ordered_questions();

    let mut visible = Vec::new();
    let mut states = BTreeMap::new();
    let mut traversed = Vec::new();

    for question in ordered {
        let state = visibility_of(question.id, &index, &latest, &mut memo, &mut visiting);
        states.insert(question.id, state);
        if state == Visibility::Shown {
            if let Some(parent) = question.show_if_question_id {
                traversed.push((parent, question.id));
            }
        }
        if state.is_visible() {
            visible.push(question);
        }
    }

    tracing::debug!(
        template = %template.key,
        visible = visible.len(),
        total = template.questions.len(),
        "resolved question visibility"
    );

    Resolution {
        visible,
        states,
        traversed,
    }
}

/// Questions visible for `responses`, in canonical order.
pub fn visible_questions<'t>(template: &'t TestTemplate, responses: &[Response]) -> Vec<&'t Question> {
    resolve(template, responses).visible
}

/// Position and question of the first visible question without a response.
pub fn next_open_question<'t>(
    visible: &[&'t Question],
    responses: &[Response],
) -> Option<(usize, &'t Question)> {
    let responded: HashSet<QuestionId> = responses.iter().map(|r| r.question_id).collect();
    visible
        .iter()
        .enumerate()
        .find(|(_, q)| !responded.contains(&q.id))
        .map(|(i, q)| (i, *q))
}

/// The question to present next, or `None` once the attempt is complete.
pub fn current_question<'t>(template: &'t TestTemplate, session: &Session) -> Option<&'t Question> {
    let visible = visible_questions(template, &session.responses);
    next_open_question(&visible, &session.responses).map(|(_, q)| q)
}

/// Whether every required visible question has a non-skipped answer and no
/// visible question is still open.
pub fn is_complete(template: &TestTemplate, session: &Session) -> bool {
    let visible = visible_questions(template, &session.responses);
    let latest = latest_responses(&session.responses);

    let required_answered = visible.iter().filter(|q| q.required).all(|q| {
        latest
            .get(&q.id)
            .is_some_and(|r| r.numeric_value().is_some())
    });

    required_answered && next_open_question(&visible, &session.responses).is_none()
}

/// Progress through the visible question sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Share of the visible sequence already passed, 0–100.
    pub percentage: u32,
    /// Visible questions with a non-skipped answer.
    pub answered_count: usize,
    /// Questions in the template.
    pub total_questions: usize,
    /// Questions visible for the current answers.
    pub visible_questions: usize,
    pub is_complete: bool,
}

/// Progress of `session` through `template`.
pub fn progress(template: &TestTemplate, session: &Session) -> Progress {
    let visible = visible_questions(template, &session.responses);
    let latest = latest_responses(&session.responses);

    let position = next_open_question(&visible, &session.responses)
        .map(|(i, _)| i)
        .unwrap_or(visible.len());

    let percentage = if visible.is_empty() {
        100
    } else {
        (position as f64 / visible.len() as f64 * 100.0).round() as u32
    };

    let answered_count = visible
        .iter()
        .filter(|q| {
            latest
                .get(&q.id)
                .is_some_and(|r| r.numeric_value().is_some())
        })
        .count();

    Progress {
        percentage,
        answered_count,
        total_questions: template.questions.len(),
        visible_questions: visible.len(),
        is_complete: is_complete(template, session),
    }
}

/// Latest response per question id.
pub(crate) fn latest_responses(responses: &[Response]) -> HashMap<QuestionId, &Response> {
    responses.iter().map(|r| (r.question_id, r)).collect()
}

fn visibility_of(
    id: QuestionId,
    index: &HashMap<QuestionId, &Question>,
    latest: &HashMap<QuestionId, &Response>,
    memo: &mut HashMap<QuestionId, Visibility>,
    visiting: &mut HashSet<QuestionId>,
) -> Visibility {
    if let Some(state) = memo.get(&id) {
        return *state;
    }
    let Some(question) = index.get(&id) else {
        return Visibility::Hidden;
    };
    let Some(condition) = question.condition() else {
        memo.insert(id, Visibility::Always);
        return Visibility::Always;
    };
    // Cycles are rejected at admission; never loop if one slips through.
    if !visiting.insert(id) {
        return Visibility::Hidden;
    }

    let parent = visibility_of(condition.question_id, index, latest, memo, visiting);
    let state = match parent {
        Visibility::Pending => Visibility::Pending,
        Visibility::Hidden => Visibility::Hidden,
        Visibility::Always | Visibility::Shown => match latest.get(&condition.question_id) {
            None => Visibility::Pending,
            Some(r) if r.skipped => Visibility::Hidden,
            Some(r) if condition.is_satisfied_by(&r.value) => Visibility::Shown,
            Some(_) => Visibility::Hidden,
        },
    };

    visiting.remove(&id);
    memo.insert(id, state);
    state
}
