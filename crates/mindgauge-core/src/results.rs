//! Assessment results.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::branching;
use crate::error::EngineError;
use crate::interpret::{self, Interpretation};
use crate::model::{NormalizationMethod, QuestionId, RiskLevel, ScoreBasis, TestTemplate};
use crate::risk;
use crate::scoring::{self, PairPreference};
use crate::session::Session;

/// Scored outcome of a completed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub attempt_id: Uuid,
    pub template_key: String,
    pub raw_score: f64,
    pub normalized_score: f64,
    pub normalization_method: NormalizationMethod,
    pub max_possible: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_scores: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_dimension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_preferences: Option<Vec<PairPreference>>,
    pub interpretation: Interpretation,
    pub recommendations: Vec<String>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub fired_indicators: Vec<String>,
    pub follow_up_suggested: bool,
    pub answered_count: usize,
    pub skipped_count: usize,
    pub completed_at: DateTime<Utc>,
}

impl AssessmentResult {
    /// Save the result to a JSON file, creating parent directories.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize result")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write result to {}", path.display()))?;
        Ok(())
    }

    /// Load a result from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read result from {}", path.display()))?;
        let result: AssessmentResult =
            serde_json::from_str(&content).context("failed to parse result JSON")?;
        Ok(result)
    }
}

/// Score, interpret and risk-assess a completed session.
///
/// Only responses to questions visible at completion count. Returns
/// [`EngineError::AttemptIncomplete`] while visible questions remain open.
pub fn evaluate(template: &TestTemplate, session: &Session) -> Result<AssessmentResult, EngineError> {
    if !session.is_complete(template) {
        let responded: HashSet<QuestionId> =
            session.responses.iter().map(|r| r.question_id).collect();
        let remaining = branching::visible_questions(template, &session.responses)
            .iter()
            .filter(|q| !responded.contains(&q.id))
            .count();
        return Err(EngineError::AttemptIncomplete { remaining });
    }

    let responses = session.effective_responses(template);
    let guide = &template.interpretation_guide;

    let outcome = scoring::score(template, &responses);
    let basis = match guide.score_basis {
        ScoreBasis::Normalized => outcome.normalized_score,
        ScoreBasis::Raw => outcome.raw_score,
    };

    let range_follow_up = interpret::find_range(guide, basis)
        .map(|r| r.follow_up)
        .unwrap_or(false);
    let interpretation = interpret::interpret(guide, basis);
    let recommendations = interpret::recommendations(guide, basis);
    let risk = risk::assess(&guide.risk_indicators, &responses);

    let skipped_count = responses.iter().filter(|r| r.skipped).count();
    let result = AssessmentResult {
        attempt_id: session.attempt_id,
        template_key: session.template_key.clone(),
        raw_score: outcome.raw_score,
        normalized_score: outcome.normalized_score,
        normalization_method: outcome.normalization_method,
        max_possible: outcome.max_possible,
        dimension_scores: outcome.dimension_scores,
        dominant_dimension: outcome.dominant_dimension,
        category: outcome.category,
        pair_preferences: outcome.pair_preferences,
        interpretation,
        recommendations,
        risk_level: risk.level,
        fired_indicators: risk.fired,
        follow_up_suggested: risk.level >= RiskLevel::Moderate || range_follow_up,
        answered_count: responses.len() - skipped_count,
        skipped_count,
        completed_at: session.completed_at.unwrap_or_else(Utc::now),
    };

    tracing::info!(
        attempt = %result.attempt_id,
        template = %result.template_key,
        normalized = result.normalized_score,
        risk = %result.risk_level,
        "evaluated attempt"
    );
    Ok(result)
}
