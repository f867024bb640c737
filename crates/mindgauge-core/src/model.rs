//! Core data model types for mindgauge.
//!
//! These are the record shapes exchanged with template stores and callers:
//! questions, templates, scoring rules, interpretation guides and responses.
//! Field names are part of the persisted format and must not change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::condition::{Condition, ConditionOperator};

/// Identifier of a question, unique within its template.
pub type QuestionId = u32;

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Likert,
    Boolean,
    Choice,
    Scale,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::Likert => write!(f, "likert"),
            QuestionType::Boolean => write!(f, "boolean"),
            QuestionType::Choice => write!(f, "choice"),
            QuestionType::Scale => write!(f, "scale"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "likert" => Ok(QuestionType::Likert),
            "boolean" | "bool" | "yes_no" => Ok(QuestionType::Boolean),
            "choice" | "multiple_choice" => Ok(QuestionType::Choice),
            "scale" | "slider" => Ok(QuestionType::Scale),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// A single question in a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier within the template.
    pub id: QuestionId,
    /// Prompt shown to the respondent.
    #[serde(default)]
    pub text: String,
    /// Optional framing text (e.g. "Over the last two weeks").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Canonical position of the question.
    pub order: u32,
    #[serde(default = "default_question_type")]
    pub question_type: QuestionType,
    /// Inclusive lower bound for numeric answers.
    #[serde(default)]
    pub min_value: f64,
    /// Inclusive upper bound for numeric answers.
    #[serde(default = "default_max_value")]
    pub max_value: f64,
    /// Enumerated options for choice questions; answers are option indices.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Scoring multiplier. Zero excludes the question from scoring.
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_true")]
    pub required: bool,
    /// Score is inverted as `max - value + min`.
    #[serde(default)]
    pub reverse_scored: bool,
    /// Trait/dimension this question contributes to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_pair: Option<String>,
    /// Pole of a bipolar dimension that agreement pushes toward. Defaults to
    /// the first pole of the pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pole: Option<char>,
    /// Question whose answer controls this question's visibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if_question_id: Option<QuestionId>,
    /// Threshold compared against the controlling answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if_value: Option<f64>,
    /// Comparison applied between the controlling answer and the threshold.
    #[serde(default)]
    pub show_if_operator: ConditionOperator,
    /// Upper bound for the range operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_if_value_max: Option<f64>,
}

fn default_question_type() -> QuestionType {
    QuestionType::Likert
}

fn default_max_value() -> f64 {
    5.0
}

fn default_weight() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl Question {
    /// Create a required likert question with unit weight and no branching.
    pub fn likert(id: QuestionId, order: u32, min_value: f64, max_value: f64) -> Self {
        Self {
            id,
            text: String::new(),
            description: None,
            order,
            question_type: QuestionType::Likert,
            min_value,
            max_value,
            options: Vec::new(),
            weight: 1.0,
            required: true,
            reverse_scored: false,
            dimension_pair: None,
            pole: None,
            show_if_question_id: None,
            show_if_value: None,
            show_if_operator: ConditionOperator::default(),
            show_if_value_max: None,
        }
    }

    /// Effective inclusive bounds of an answer.
    ///
    /// Choice questions with an option list are bounded by the option
    /// indices, boolean questions by `0..=1`.
    pub fn bounds(&self) -> (f64, f64) {
        match self.question_type {
            QuestionType::Choice if !self.options.is_empty() => {
                (0.0, (self.options.len() - 1) as f64)
            }
            QuestionType::Boolean => (0.0, 1.0),
            _ => (self.min_value, self.max_value),
        }
    }

    /// The visibility condition attached to this question, if any.
    pub fn condition(&self) -> Option<Condition> {
        self.show_if_question_id.map(|question_id| Condition {
            question_id,
            operator: self.show_if_operator,
            threshold: self.show_if_value,
            threshold_max: self.show_if_value_max,
        })
    }

    pub fn is_conditional(&self) -> bool {
        self.show_if_question_id.is_some()
    }
}

/// Static definition of an assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestTemplate {
    /// Unique template key (e.g. "who5").
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub scoring_rules: ScoringRules,
    #[serde(default)]
    pub interpretation_guide: InterpretationGuide,
}

impl TestTemplate {
    /// Look up a question by id.
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Questions in canonical order. Ties keep their declared position.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut ordered: Vec<&Question> = self.questions.iter().collect();
        ordered.sort_by_key(|q| q.order);
        ordered
    }
}

/// Scoring strategy of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringType {
    #[default]
    SimpleSum,
    WeightedSum,
    Dimensional,
    Categorical,
}

impl fmt::Display for ScoringType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringType::SimpleSum => write!(f, "simple_sum"),
            ScoringType::WeightedSum => write!(f, "weighted_sum"),
            ScoringType::Dimensional => write!(f, "dimensional"),
            ScoringType::Categorical => write!(f, "categorical"),
        }
    }
}

/// How categorical scoring builds its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalMode {
    /// Concatenate the names of the highest-scoring dimensions.
    #[default]
    TopDimensions,
    /// Each dimension is a two-letter bipolar pair; take one pole per pair.
    Pairs,
}

impl fmt::Display for CategoricalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoricalMode::TopDimensions => write!(f, "top_dimensions"),
            CategoricalMode::Pairs => write!(f, "pairs"),
        }
    }
}

/// How a raw score is rescaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    #[default]
    Percentage,
    ZScore,
    Percentile,
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationMethod::Percentage => write!(f, "percentage"),
            NormalizationMethod::ZScore => write!(f, "z_score"),
            NormalizationMethod::Percentile => write!(f, "percentile"),
        }
    }
}

/// Population norms used by the z-score and percentile normalizations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Norms {
    pub mean: f64,
    pub std_dev: f64,
}

/// Scoring configuration of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    #[serde(rename = "type", default)]
    pub scoring_type: ScoringType,
    /// Declared dimensions, in display order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<String>,
    /// Questions scored in reverse in addition to those flagged `reverse_scored`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reverse_questions: Vec<QuestionId>,
    #[serde(default)]
    pub normalization_method: NormalizationMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub norms: Option<Norms>,
    /// Number of leading dimensions joined into a categorical label.
    #[serde(default = "default_top_dimensions")]
    pub top_dimensions: usize,
    #[serde(default)]
    pub categorical_mode: CategoricalMode,
}

fn default_top_dimensions() -> usize {
    2
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            scoring_type: ScoringType::SimpleSum,
            dimensions: Vec::new(),
            reverse_questions: Vec::new(),
            normalization_method: NormalizationMethod::Percentage,
            norms: None,
            top_dimensions: default_top_dimensions(),
            categorical_mode: CategoricalMode::default(),
        }
    }
}

/// Which score the interpretation guide is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBasis {
    #[default]
    Normalized,
    Raw,
}

/// Interpretation guide of a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpretationGuide {
    /// Ordered, non-overlapping score bands.
    #[serde(default)]
    pub score_ranges: Vec<ScoreRange>,
    #[serde(default)]
    pub recommendation_rules: Vec<RecommendationRule>,
    #[serde(default)]
    pub risk_indicators: Vec<RiskIndicator>,
    #[serde(default)]
    pub score_basis: ScoreBasis,
    /// Cap on the number of recommendations returned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_recommendations: Option<usize>,
}

/// A score band with its interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min_score: f64,
    pub max_score: f64,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    /// Whether landing in this band suggests a follow-up.
    #[serde(default)]
    pub follow_up: bool,
}

impl ScoreRange {
    pub fn contains(&self, score: f64) -> bool {
        self.min_score <= score && score <= self.max_score
    }
}

/// Recommendations emitted when `condition` (an expression over `score`) holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRule {
    pub condition: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Clinical risk level, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Whether one matching question or all of them fire an indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorMode {
    #[default]
    Any,
    All,
}

/// A response pattern that flags clinical risk independent of the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskIndicator {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub question_ids: Vec<QuestionId>,
    /// Thresholds aligned with `question_ids`; short lists fall back to the first.
    pub thresholds: Vec<f64>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub operator: ConditionOperator,
    #[serde(default)]
    pub mode: IndicatorMode,
}

impl RiskIndicator {
    /// Threshold aligned with the question at `index`.
    pub fn threshold_at(&self, index: usize) -> Option<f64> {
        self.thresholds
            .get(index)
            .or_else(|| self.thresholds.first())
            .copied()
    }
}

/// An answer value: a number, or the string form used by choice questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseValue {
    Number(f64),
    Text(String),
}

impl ResponseValue {
    /// Coerce to a finite number. Numeric strings are parsed.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            ResponseValue::Number(n) => *n,
            ResponseValue::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        n.is_finite().then_some(n)
    }
}

impl fmt::Display for ResponseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseValue::Number(n) => write!(f, "{n}"),
            ResponseValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ResponseValue {
    fn from(value: f64) -> Self {
        ResponseValue::Number(value)
    }
}

impl From<i32> for ResponseValue {
    fn from(value: i32) -> Self {
        ResponseValue::Number(value as f64)
    }
}

impl From<u32> for ResponseValue {
    fn from(value: u32) -> Self {
        ResponseValue::Number(value as f64)
    }
}

impl From<&str> for ResponseValue {
    fn from(value: &str) -> Self {
        ResponseValue::Text(value.to_string())
    }
}

impl From<String> for ResponseValue {
    fn from(value: String) -> Self {
        ResponseValue::Text(value)
    }
}

/// One recorded answer (or skip) within an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub question_id: QuestionId,
    pub value: ResponseValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub skipped: bool,
}

impl Response {
    pub fn answered(question_id: QuestionId, value: impl Into<ResponseValue>) -> Self {
        Self {
            question_id,
            value: value.into(),
            response_time_ms: None,
            skipped: false,
        }
    }

    pub fn skipped(question_id: QuestionId) -> Self {
        Self {
            question_id,
            value: ResponseValue::Number(0.0),
            response_time_ms: None,
            skipped: true,
        }
    }

    /// Numeric value of a non-skipped response.
    pub fn numeric_value(&self) -> Option<f64> {
        if self.skipped {
            None
        } else {
            self.value.as_number()
        }
    }
}
