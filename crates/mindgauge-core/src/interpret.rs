//! Interpretation resolver.

use serde::{Deserialize, Serialize};

use crate::error::InterpretationError;
use crate::expr;
use crate::model::{InterpretationGuide, ScoreRange};

/// Human-readable reading of a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub label: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// `false` when no score range contained the score.
    pub matched: bool,
}

impl Interpretation {
    pub fn unknown() -> Self {
        Self {
            label: "unknown".to_string(),
            description: "The score falls outside every interpretation range.".to_string(),
            color: None,
            matched: false,
        }
    }
}

impl From<&ScoreRange> for Interpretation {
    fn from(range: &ScoreRange) -> Self {
        Self {
            label: range.label.clone(),
            description: range.description.clone(),
            color: range.color.clone(),
            matched: true,
        }
    }
}

/// First score range containing `score`.
pub fn find_range(guide: &InterpretationGuide, score: f64) -> Result<&ScoreRange, InterpretationError> {
    guide
        .score_ranges
        .iter()
        .find(|r| r.contains(score))
        .ok_or(InterpretationError::UnknownScoreRange { score })
}

/// Interpret `score`, falling back to [`Interpretation::unknown`].
pub fn interpret(guide: &InterpretationGuide, score: f64) -> Interpretation {
    match find_range(guide, score) {
        Ok(range) => range.into(),
        Err(e) => {
            tracing::warn!(error = %e, "using unknown interpretation");
            Interpretation::unknown()
        }
    }
}

/// Recommendations for `score`.
///
/// The matched range's own list comes first, then every rule whose
/// condition holds, in declaration order. Duplicates are dropped and the
/// list is capped at `max_recommendations`. Rules with unparsable conditions
/// are skipped.
pub fn recommendations(guide: &InterpretationGuide, score: f64) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |rec: &String| {
        if !out.contains(rec) {
            out.push(rec.clone());
        }
    };

    if let Ok(range) = find_range(guide, score) {
        range.recommendations.iter().for_each(&mut push);
    }

    for rule in &guide.recommendation_rules {
        match expr::evaluate(&rule.condition, score) {
            Ok(true) => rule.recommendations.iter().for_each(&mut push),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(condition = %rule.condition, error = %e, "skipping recommendation rule");
            }
        }
    }

    if let Some(cap) = guide.max_recommendations {
        out.truncate(cap);
    }
    out
}
