//! Built-in instruments.
//!
//! Standard screening questionnaires ready to be served without any template
//! files. Both pass rule validation.

use crate::condition::ConditionOperator;
use crate::model::{
    IndicatorMode, InterpretationGuide, Question, QuestionType, RecommendationRule,
    RiskIndicator, RiskLevel, ScoreBasis, ScoreRange, ScoringRules, ScoringType, TestTemplate,
};

pub const WHO5_KEY: &str = "who5";
pub const GAD7_KEY: &str = "gad7";

/// Every built-in template.
pub fn builtin() -> Vec<TestTemplate> {
    vec![gad7(), who5()]
}

fn range(
    min_score: f64,
    max_score: f64,
    label: &str,
    color: &str,
    description: &str,
    recommendations: &[&str],
    follow_up: bool,
) -> ScoreRange {
    ScoreRange {
        min_score,
        max_score,
        label: label.to_string(),
        description: description.to_string(),
        color: Some(color.to_string()),
        recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
        follow_up,
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const WHO5_ITEMS: [&str; 5] = [
    "I have felt cheerful and in good spirits",
    "I have felt calm and relaxed",
    "I have felt active and vigorous",
    "I woke up feeling fresh and rested",
    "My daily life has been filled with things that interest me",
];

const WHO5_OPTIONS: [&str; 6] = [
    "At no time",
    "Some of the time",
    "Less than half of the time",
    "More than half of the time",
    "Most of the time",
    "All of the time",
];

/// WHO-5 Well-Being Index: five 0–5 items, percentage of 25.
pub fn who5() -> TestTemplate {
    let questions = WHO5_ITEMS
        .iter()
        .zip(1u32..)
        .map(|(text, id)| Question {
            text: text.to_string(),
            description: Some("Over the last two weeks:".to_string()),
            options: strings(&WHO5_OPTIONS),
            ..Question::likert(id, id, 0.0, 5.0)
        })
        .collect();

    TestTemplate {
        key: WHO5_KEY.to_string(),
        name: "WHO-5 Well-Being Index".to_string(),
        description: "Five-item measure of current mental wellbeing.".to_string(),
        version: Some("1.0".to_string()),
        questions,
        scoring_rules: ScoringRules::default(),
        interpretation_guide: InterpretationGuide {
            score_ranges: vec![
                range(
                    0.0,
                    28.0,
                    "poor",
                    "#dc3545",
                    "Poor wellbeing. Significant challenges with mental health and life satisfaction are likely.",
                    &[
                        "Consider speaking with a mental health professional",
                        "Reach out to trusted friends, family, or support services",
                        "Focus on basic self-care: regular sleep, nutrition, and gentle exercise",
                    ],
                    true,
                ),
                range(
                    29.0,
                    50.0,
                    "below_average",
                    "#fd7e14",
                    "Below-average wellbeing with room for improvement.",
                    &[
                        "Consider professional support or counseling",
                        "Implement stress management techniques",
                    ],
                    true,
                ),
                range(
                    51.0,
                    68.0,
                    "average",
                    "#ffc107",
                    "Average wellbeing.",
                    &[
                        "Consider adding new wellbeing activities to your routine",
                        "Practice gratitude and mindfulness",
                    ],
                    false,
                ),
                range(
                    69.0,
                    84.0,
                    "good",
                    "#28a745",
                    "Good wellbeing most of the time.",
                    &["Continue with the practices that support your wellbeing"],
                    false,
                ),
                range(
                    85.0,
                    100.0,
                    "excellent",
                    "#20c997",
                    "Excellent wellbeing.",
                    &["Maintain your current wellbeing practices"],
                    false,
                ),
            ],
            recommendation_rules: vec![RecommendationRule {
                condition: "score <= 50".to_string(),
                recommendations: strings(&["Consider a depression screening such as the PHQ-9"]),
            }],
            risk_indicators: vec![
                RiskIndicator {
                    name: "all items at no time".to_string(),
                    description: Some("Complete absence of positive wellbeing".to_string()),
                    question_ids: vec![1, 2, 3, 4, 5],
                    thresholds: vec![0.0],
                    risk_level: RiskLevel::High,
                    operator: ConditionOperator::Lte,
                    mode: IndicatorMode::All,
                },
                RiskIndicator {
                    name: "item at no time".to_string(),
                    description: Some("At least one area of very low wellbeing".to_string()),
                    question_ids: vec![1, 2, 3, 4, 5],
                    thresholds: vec![0.0],
                    risk_level: RiskLevel::Moderate,
                    operator: ConditionOperator::Lte,
                    mode: IndicatorMode::Any,
                },
            ],
            score_basis: ScoreBasis::Normalized,
            max_recommendations: None,
        },
    }
}

const GAD7_ITEMS: [&str; 7] = [
    "Feeling nervous, anxious, or on edge",
    "Not being able to stop or control worrying",
    "Worrying too much about different things",
    "Trouble relaxing",
    "Being so restless that it's hard to sit still",
    "Becoming easily annoyed or irritable",
    "Feeling afraid as if something awful might happen",
];

const GAD7_OPTIONS: [&str; 4] = [
    "Not at all",
    "Several days",
    "More than half the days",
    "Nearly every day",
];

/// GAD-7 anxiety scale: seven 0–3 choice items, interpreted on the raw sum.
pub fn gad7() -> TestTemplate {
    let questions = GAD7_ITEMS
        .iter()
        .zip(1u32..)
        .map(|(text, id)| Question {
            text: text.to_string(),
            description: Some(
                "Over the last 2 weeks, how often have you been bothered by:".to_string(),
            ),
            question_type: QuestionType::Choice,
            options: strings(&GAD7_OPTIONS),
            ..Question::likert(id, id, 0.0, 3.0)
        })
        .collect();

    TestTemplate {
        key: GAD7_KEY.to_string(),
        name: "GAD-7 Anxiety Scale".to_string(),
        description: "Seven-item screening tool for generalized anxiety disorder.".to_string(),
        version: Some("1.0".to_string()),
        questions,
        scoring_rules: ScoringRules {
            scoring_type: ScoringType::SimpleSum,
            ..ScoringRules::default()
        },
        interpretation_guide: InterpretationGuide {
            score_ranges: vec![
                range(
                    0.0,
                    4.0,
                    "minimal",
                    "#28a745",
                    "Minimal anxiety",
                    &[
                        "Continue current positive coping strategies",
                        "Stay aware of stress triggers and manage them proactively",
                    ],
                    false,
                ),
                range(
                    5.0,
                    7.0,
                    "mild",
                    "#ffc107",
                    "Mild anxiety",
                    &[
                        "Monitor anxiety levels and practice self-care",
                        "Use stress reduction techniques when feeling anxious",
                    ],
                    false,
                ),
                range(
                    8.0,
                    14.0,
                    "moderate",
                    "#fd7e14",
                    "Moderate anxiety",
                    &[
                        "Consider speaking with a counselor or therapist",
                        "Try stress management techniques like mindfulness meditation",
                    ],
                    false,
                ),
                range(
                    15.0,
                    21.0,
                    "severe",
                    "#dc3545",
                    "Severe anxiety",
                    &[
                        "Seek professional mental health evaluation",
                        "Consider anxiety treatment options with a healthcare provider",
                    ],
                    true,
                ),
            ],
            recommendation_rules: vec![RecommendationRule {
                condition: "score >= 10".to_string(),
                recommendations: strings(&["A clinical evaluation is recommended"]),
            }],
            risk_indicators: vec![RiskIndicator {
                name: "anticipatory anxiety".to_string(),
                description: Some("Feeling afraid that something awful might happen".to_string()),
                question_ids: vec![7],
                thresholds: vec![2.0],
                risk_level: RiskLevel::High,
                operator: ConditionOperator::Gte,
                mode: IndicatorMode::Any,
            }],
            score_basis: ScoreBasis::Raw,
            max_recommendations: None,
        },
    }
}
