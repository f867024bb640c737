//! Template admission checks and the authoring view of branching.
//!
//! [`validate_template`] runs once per template, before any attempt can see
//! it. Problems are collected into a [`ValidationReport`] rather than raised,
//! so authors see every defect at once.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::condition::ConditionOperator;
use crate::expr::{Expr, ExprError};
use crate::model::{CategoricalMode, NormalizationMethod, QuestionId, ScoringType, TestTemplate};
use crate::scoring::{dimensions_of, pair_poles};

/// A defect that blocks a template from being served.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateDefect {
    #[error("circular dependency: {}", join_path(.0))]
    CircularDependency(Vec<QuestionId>),

    #[error("question {question} depends on unknown question {missing}")]
    DanglingReference {
        question: QuestionId,
        missing: QuestionId,
    },

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(QuestionId),

    #[error("question {0} has min_value greater than max_value")]
    InvertedBounds(QuestionId),

    #[error("question {question} threshold {threshold} is outside the bounds [{min}, {max}] of question {parent}")]
    ThresholdOutOfBounds {
        question: QuestionId,
        parent: QuestionId,
        threshold: f64,
        min: f64,
        max: f64,
    },

    #[error("question {0} uses a range operator with show_if_value_max below show_if_value")]
    InvertedConditionRange(QuestionId),

    #[error("score ranges '{first}' and '{second}' overlap")]
    OverlappingRanges { first: String, second: String },

    #[error("score range '{0}' has min_score greater than max_score")]
    InvertedRange(String),

    #[error("recommendation condition '{condition}' is invalid: {source}")]
    InvalidCondition {
        condition: String,
        #[source]
        source: ExprError,
    },

    #[error("risk indicator '{indicator}' references unknown question {missing}")]
    UnknownIndicatorQuestion {
        indicator: String,
        missing: QuestionId,
    },

    #[error("risk indicator '{0}' has no questions or no thresholds")]
    EmptyIndicator(String),

    #[error("{0} normalization requires norms with a positive std_dev")]
    MissingNorms(NormalizationMethod),

    #[error("dimension '{0}' is not a pair of two distinct pole letters")]
    NotAPair(String),

    #[error("question {question} pole '{pole}' is not a pole of dimension '{dimension}'")]
    UnknownPole {
        question: QuestionId,
        pole: char,
        dimension: String,
    },
}

fn join_path(path: &[QuestionId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A non-blocking authoring concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// The question concerned (if applicable).
    pub question_id: Option<QuestionId>,
    pub message: String,
}

/// Outcome of [`validate_template`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationWarning>,
}

/// Statically check a template.
pub fn validate_template(template: &TestTemplate) -> ValidationReport {
    let mut defects = Vec::new();
    let mut warnings = Vec::new();

    check_questions(template, &mut defects, &mut warnings);
    for cycle in find_cycles(template) {
        defects.push(TemplateDefect::CircularDependency(cycle));
    }
    check_scoring(template, &mut defects, &mut warnings);
    check_interpretation(template, &mut defects);

    if template.questions.is_empty() {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "template has no questions".into(),
        });
    }

    let errors: Vec<String> = defects.iter().map(ToString::to_string).collect();
    tracing::debug!(
        template = %template.key,
        errors = errors.len(),
        warnings = warnings.len(),
        "validated template"
    );

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

fn check_questions(
    template: &TestTemplate,
    defects: &mut Vec<TemplateDefect>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let mut seen = HashSet::new();
    for q in &template.questions {
        if !seen.insert(q.id) {
            defects.push(TemplateDefect::DuplicateQuestion(q.id));
        }
        if q.min_value > q.max_value {
            defects.push(TemplateDefect::InvertedBounds(q.id));
        }
    }

    for q in &template.questions {
        let Some(parent_id) = q.show_if_question_id else {
            continue;
        };
        let Some(parent) = template.question(parent_id) else {
            defects.push(TemplateDefect::DanglingReference {
                question: q.id,
                missing: parent_id,
            });
            continue;
        };

        let (min, max) = parent.bounds();
        for threshold in [q.show_if_value, q.show_if_value_max].into_iter().flatten() {
            if threshold < min || threshold > max {
                defects.push(TemplateDefect::ThresholdOutOfBounds {
                    question: q.id,
                    parent: parent_id,
                    threshold,
                    min,
                    max,
                });
            }
        }
        if q.show_if_operator.is_range() {
            if let (Some(low), Some(high)) = (q.show_if_value, q.show_if_value_max) {
                if high < low {
                    defects.push(TemplateDefect::InvertedConditionRange(q.id));
                }
            }
        }

        if parent_id != q.id && parent.order > q.order {
            warnings.push(ValidationWarning {
                question_id: Some(q.id),
                message: format!(
                    "depends on question {parent_id}, which is ordered after it; it can only appear once that question is answered"
                ),
            });
        }
    }
}

/// Depth-first search over `parent -> dependent` edges with an explicit
/// recursion stack. Each back edge yields one cycle, reported as a closed
/// path (`[1, 2, 1]`).
fn find_cycles(template: &TestTemplate) -> Vec<Vec<QuestionId>> {
    let known: HashSet<QuestionId> = template.questions.iter().map(|q| q.id).collect();
    let mut children: BTreeMap<QuestionId, Vec<QuestionId>> = BTreeMap::new();
    for q in template.ordered_questions() {
        if let Some(parent) = q.show_if_question_id.filter(|p| known.contains(p)) {
            children.entry(parent).or_default().push(q.id);
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        OnStack,
        Done,
    }

    fn visit(
        node: QuestionId,
        children: &BTreeMap<QuestionId, Vec<QuestionId>>,
        marks: &mut HashMap<QuestionId, Mark>,
        stack: &mut Vec<QuestionId>,
        cycles: &mut Vec<Vec<QuestionId>>,
    ) {
        marks.insert(node, Mark::OnStack);
        stack.push(node);
        for &child in children.get(&node).map(Vec::as_slice).unwrap_or_default() {
            match marks.get(&child) {
                Some(Mark::OnStack) => {
                    if let Some(start) = stack.iter().position(|&id| id == child) {
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(child);
                        cycles.push(cycle);
                    }
                }
                Some(Mark::Done) => {}
                None => visit(child, children, marks, stack, cycles),
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
    }

    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    let mut cycles = Vec::new();
    for q in template.ordered_questions() {
        if !marks.contains_key(&q.id) {
            visit(q.id, &children, &mut marks, &mut stack, &mut cycles);
        }
    }
    cycles
}

fn check_scoring(
    template: &TestTemplate,
    defects: &mut Vec<TemplateDefect>,
    warnings: &mut Vec<ValidationWarning>,
) {
    let rules = &template.scoring_rules;

    let uses_norms = matches!(
        rules.scoring_type,
        ScoringType::SimpleSum | ScoringType::WeightedSum
    ) && rules.normalization_method != NormalizationMethod::Percentage;
    if uses_norms && !rules.norms.is_some_and(|n| n.std_dev > 0.0) {
        defects.push(TemplateDefect::MissingNorms(rules.normalization_method));
    }

    if matches!(
        rules.scoring_type,
        ScoringType::Dimensional | ScoringType::Categorical
    ) {
        let dims = dimensions_of(template);
        if dims.is_empty() {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!("{} scoring without any dimensions", rules.scoring_type),
            });
        }
        for dim in &dims {
            let tagged = template
                .questions
                .iter()
                .any(|q| q.dimension_pair.as_deref() == Some(dim.as_str()));
            if !tagged {
                warnings.push(ValidationWarning {
                    question_id: None,
                    message: format!("no question is tagged with dimension '{dim}'"),
                });
            }
        }
        for q in &template.questions {
            if let Some(dim) = &q.dimension_pair {
                if !dims.contains(dim) {
                    warnings.push(ValidationWarning {
                        question_id: Some(q.id),
                        message: format!("dimension '{dim}' is not declared and will not be scored"),
                    });
                }
            }
        }
    }

    if rules.scoring_type == ScoringType::Categorical
        && rules.categorical_mode == CategoricalMode::Pairs
    {
        check_pairs(template, defects);
    }
}

fn check_pairs(template: &TestTemplate, defects: &mut Vec<TemplateDefect>) {
    for dim in dimensions_of(template) {
        if pair_poles(&dim).is_none() {
            defects.push(TemplateDefect::NotAPair(dim));
        }
    }
    for q in &template.questions {
        let (Some(dim), Some(pole)) = (&q.dimension_pair, q.pole) else {
            continue;
        };
        if let Some((first, second)) = pair_poles(dim) {
            if pole != first && pole != second {
                defects.push(TemplateDefect::UnknownPole {
                    question: q.id,
                    pole,
                    dimension: dim.clone(),
                });
            }
        }
    }
}

fn check_interpretation(template: &TestTemplate, defects: &mut Vec<TemplateDefect>) {
    let guide = &template.interpretation_guide;

    let mut ranges: Vec<_> = guide.score_ranges.iter().collect();
    for range in &ranges {
        if range.min_score > range.max_score {
            defects.push(TemplateDefect::InvertedRange(range.label.clone()));
        }
    }
    ranges.sort_by(|a, b| a.min_score.total_cmp(&b.min_score));
    for pair in ranges.windows(2) {
        if pair[1].min_score <= pair[0].max_score {
            defects.push(TemplateDefect::OverlappingRanges {
                first: pair[0].label.clone(),
                second: pair[1].label.clone(),
            });
        }
    }

    for rule in &guide.recommendation_rules {
        if let Err(source) = Expr::parse(&rule.condition) {
            defects.push(TemplateDefect::InvalidCondition {
                condition: rule.condition.clone(),
                source,
            });
        }
    }

    for indicator in &guide.risk_indicators {
        if indicator.question_ids.is_empty() || indicator.thresholds.is_empty() {
            defects.push(TemplateDefect::EmptyIndicator(indicator.name.clone()));
        }
        for id in &indicator.question_ids {
            if template.question(*id).is_none() {
                defects.push(TemplateDefect::UnknownIndicatorQuestion {
                    indicator: indicator.name.clone(),
                    missing: *id,
                });
            }
        }
    }
}

/// The branching condition of a tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCondition {
    pub depends_on_question: QuestionId,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_max: Option<f64>,
}

/// One question in the branching tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: QuestionId,
    pub order: u32,
    pub text: String,
    pub always_shown: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<NodeCondition>,
    /// Questions whose visibility depends on this one.
    pub dependents: Vec<QuestionId>,
}

/// A conditional edge `from -> to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub from: QuestionId,
    pub to: QuestionId,
    /// Readable condition, e.g. `>= 3`.
    pub condition: String,
}

/// Adjacency view of a template's branching, for authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchingTree {
    pub template_key: String,
    pub questions: Vec<TreeNode>,
    pub branches: Vec<Branch>,
}

impl BranchingTree {
    /// Questions shown without any condition.
    pub fn roots(&self) -> impl Iterator<Item = &TreeNode> {
        self.questions.iter().filter(|n| n.always_shown)
    }

    pub fn node(&self, id: QuestionId) -> Option<&TreeNode> {
        self.questions.iter().find(|n| n.id == id)
    }
}

/// Build the branching tree of `template`, nodes in canonical order.
pub fn branching_tree(template: &TestTemplate) -> BranchingTree {
    let ordered = template.ordered_questions();

    let mut dependents: HashMap<QuestionId, Vec<QuestionId>> = HashMap::new();
    let mut branches = Vec::new();
    for q in &ordered {
        if let Some(condition) = q.condition() {
            dependents.entry(condition.question_id).or_default().push(q.id);
            branches.push(Branch {
                from: condition.question_id,
                to: q.id,
                condition: condition.describe(),
            });
        }
    }

    let questions = ordered
        .iter()
        .map(|q| TreeNode {
            id: q.id,
            order: q.order,
            text: q.text.clone(),
            always_shown: !q.is_conditional(),
            condition: q.condition().map(|c| NodeCondition {
                depends_on_question: c.question_id,
                operator: c.operator,
                threshold_value: c.threshold,
                threshold_max: c.threshold_max,
            }),
            dependents: dependents.remove(&q.id).unwrap_or_default(),
        })
        .collect();

    BranchingTree {
        template_key: template.key.clone(),
        questions,
        branches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        InterpretationGuide, Norms, Question, RecommendationRule, RiskIndicator, RiskLevel,
        ScoreRange, ScoringRules,
    };

    fn template(questions: Vec<Question>) -> TestTemplate {
        TestTemplate {
            key: "rules".into(),
            name: String::new(),
            description: String::new(),
            version: None,
            questions,
            scoring_rules: ScoringRules::default(),
            interpretation_guide: InterpretationGuide::default(),
        }
    }

    fn depends(mut q: Question, parent: QuestionId, value: f64) -> Question {
        q.show_if_question_id = Some(parent);
        q.show_if_value = Some(value);
        q
    }

    fn range(min: f64, max: f64, label: &str) -> ScoreRange {
        ScoreRange {
            min_score: min,
            max_score: max,
            label: label.into(),
            description: String::new(),
            color: None,
            recommendations: vec![],
            follow_up: false,
        }
    }

    #[test]
    fn clean_template_is_valid() {
        let t = template(vec![
            Question::likert(1, 1, 0.0, 5.0),
            depends(Question::likert(2, 2, 0.0, 5.0), 1, 3.0),
        ]);
        let report = validate_template(&t);
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn two_question_cycle_is_named() {
        let t = template(vec![
            depends(Question::likert(1, 1, 0.0, 5.0), 2, 1.0),
            depends(Question::likert(2, 2, 0.0, 5.0), 1, 1.0),
        ]);
        let report = validate_template(&t);
        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["circular dependency: 1 -> 2 -> 1"]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let t = template(vec![depends(Question::likert(1, 1, 0.0, 5.0), 1, 1.0)]);
        let report = validate_template(&t);
        assert_eq!(report.errors, vec!["circular dependency: 1 -> 1"]);
    }

    #[test]
    fn longer_cycle_reports_every_member() {
        let t = template(vec![
            Question::likert(9, 0, 0.0, 5.0),
            depends(Question::likert(1, 1, 0.0, 5.0), 3, 1.0),
            depends(Question::likert(2, 2, 0.0, 5.0), 1, 1.0),
            depends(Question::likert(3, 3, 0.0, 5.0), 2, 1.0),
        ]);
        let cycles = find_cycles(&t);
        assert_eq!(cycles, vec![vec![1, 2, 3, 1]]);
    }

    #[test]
    fn dangling_reference() {
        let t = template(vec![depends(Question::likert(1, 1, 0.0, 5.0), 7, 1.0)]);
        let report = validate_template(&t);
        assert!(!report.is_valid);
        assert_eq!(
            report.errors,
            vec!["question 1 depends on unknown question 7"]
        );
    }

    #[test]
    fn duplicates_and_out_of_bounds_thresholds() {
        let t = template(vec![
            Question::likert(1, 1, 0.0, 5.0),
            Question::likert(1, 2, 0.0, 5.0),
            depends(Question::likert(3, 3, 0.0, 5.0), 2, 1.0),
            depends(Question::likert(4, 4, 0.0, 5.0), 1, 9.0),
        ]);
        let report = validate_template(&t);
        assert!(report.errors.contains(&"duplicate question id: 1".to_string()));
        assert!(report
            .errors
            .iter()
            .any(|e| e.starts_with("question 4 threshold 9")));
        assert!(report.errors.iter().any(|e| e.contains("unknown question 2")));
    }

    #[test]
    fn later_dependency_is_a_warning() {
        let t = template(vec![
            depends(Question::likert(1, 1, 0.0, 5.0), 2, 1.0),
            Question::likert(2, 2, 0.0, 5.0),
        ]);
        let report = validate_template(&t);
        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].question_id, Some(1));
    }

    #[test]
    fn interpretation_defects() {
        let mut t = template(vec![Question::likert(1, 1, 0.0, 5.0)]);
        t.interpretation_guide = InterpretationGuide {
            score_ranges: vec![range(0.0, 50.0, "low"), range(40.0, 100.0, "high")],
            recommendation_rules: vec![RecommendationRule {
                condition: "score >".into(),
                recommendations: vec![],
            }],
            risk_indicators: vec![RiskIndicator {
                name: "ghost".into(),
                description: None,
                question_ids: vec![5],
                thresholds: vec![],
                risk_level: RiskLevel::High,
                operator: ConditionOperator::Gte,
                mode: Default::default(),
            }],
            ..InterpretationGuide::default()
        };
        let report = validate_template(&t);
        assert!(!report.is_valid);
        assert!(report
            .errors
            .contains(&"score ranges 'low' and 'high' overlap".to_string()));
        assert!(report
            .errors
            .iter()
            .any(|e| e.starts_with("recommendation condition 'score >'")));
        assert!(report
            .errors
            .contains(&"risk indicator 'ghost' has no questions or no thresholds".to_string()));
        assert!(report
            .errors
            .contains(&"risk indicator 'ghost' references unknown question 5".to_string()));
    }

    #[test]
    fn percentile_without_norms() {
        let mut t = template(vec![Question::likert(1, 1, 0.0, 5.0)]);
        t.scoring_rules.normalization_method = NormalizationMethod::Percentile;
        let report = validate_template(&t);
        assert_eq!(
            report.errors,
            vec!["percentile normalization requires norms with a positive std_dev"]
        );
        t.scoring_rules.norms = Some(Norms {
            mean: 2.0,
            std_dev: 1.0,
        });
        assert!(validate_template(&t).is_valid);
    }

    #[test]
    fn untagged_dimension_warns() {
        let mut q = Question::likert(1, 1, 0.0, 5.0);
        q.dimension_pair = Some("D".into());
        let mut t = template(vec![q]);
        t.scoring_rules.scoring_type = ScoringType::Dimensional;
        t.scoring_rules.dimensions = vec!["D".into(), "I".into()];
        let report = validate_template(&t);
        assert!(report.is_valid);
        assert_eq!(
            report.warnings[0].message,
            "no question is tagged with dimension 'I'"
        );
    }

    #[test]
    fn pair_mode_checks_dimensions_and_poles() {
        let mut q1 = Question::likert(1, 1, 1.0, 5.0);
        q1.dimension_pair = Some("EI".into());
        q1.pole = Some('I');
        let mut q2 = Question::likert(2, 2, 1.0, 5.0);
        q2.dimension_pair = Some("EI".into());
        q2.pole = Some('X');
        let mut q3 = Question::likert(3, 3, 1.0, 5.0);
        q3.dimension_pair = Some("TFP".into());

        let mut t = template(vec![q1, q2, q3]);
        t.scoring_rules.scoring_type = ScoringType::Categorical;
        t.scoring_rules.dimensions = vec!["EI".into(), "TFP".into()];

        // Top-dimension labels accept any names.
        assert!(validate_template(&t).is_valid);

        t.scoring_rules.categorical_mode = CategoricalMode::Pairs;
        let report = validate_template(&t);
        assert!(!report.is_valid);
        assert_eq!(
            report.errors,
            vec![
                "dimension 'TFP' is not a pair of two distinct pole letters",
                "question 2 pole 'X' is not a pole of dimension 'EI'",
            ]
        );
    }

    #[test]
    fn tree_lists_dependents_and_branches() {
        let mut q3 = depends(Question::likert(3, 3, 0.0, 5.0), 1, 1.0);
        q3.show_if_operator = ConditionOperator::InRange;
        q3.show_if_value_max = Some(2.0);
        let t = template(vec![
            Question::likert(1, 1, 0.0, 5.0),
            depends(Question::likert(2, 2, 0.0, 5.0), 1, 3.0),
            q3,
        ]);
        let tree = branching_tree(&t);
        assert_eq!(tree.template_key, "rules");
        assert_eq!(tree.roots().count(), 1);
        assert_eq!(tree.node(1).unwrap().dependents, vec![2, 3]);
        assert_eq!(tree.branches.len(), 2);
        assert_eq!(tree.branches[0].condition, ">= 3");
        let node = tree.node(3).unwrap();
        assert!(!node.always_shown);
        assert_eq!(
            node.condition.as_ref().map(|c| c.operator),
            Some(ConditionOperator::InRange)
        );
    }
}
