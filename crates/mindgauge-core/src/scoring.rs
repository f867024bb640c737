//! Scoring engine.
//!
//! Pure functions over a template and a frozen response set. Identical input
//! always produces bit-identical output: iteration follows question order and
//! declared dimension order, never hash order.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{
    CategoricalMode, NormalizationMethod, Question, QuestionId, Response, ScoringRules,
    ScoringType, TestTemplate,
};

/// Points of the response scale assumed by dimensional normalization.
const DIMENSION_SCALE_POINTS: f64 = 5.0;

/// Output of [`score`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub scoring_type: ScoringType,
    pub raw_score: f64,
    pub normalized_score: f64,
    /// Normalization actually applied (after any fallback).
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
}

/// Lean of one bipolar dimension in `pairs` categorical mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairPreference {
    pub dimension: String,
    /// The pole the answers lean toward.
    pub preference: char,
    /// Signed strength; positive leans to the first pole.
    pub score: f64,
    /// `|score|` as a share of the strongest possible lean, 0 to 1.
    pub confidence: f64,
}

/// Score `responses` against `template`.
///
/// Skipped responses, responses to weight-0 questions and responses naming
/// unknown questions never contribute.
pub fn score(template: &TestTemplate, responses: &[Response]) -> ScoreOutcome {
    let rules = &template.scoring_rules;
    let contributions = contributions(template, responses);
    let max_possible = max_possible(template);

    let outcome = match rules.scoring_type {
        ScoringType::SimpleSum | ScoringType::WeightedSum => {
            let raw_score: f64 = contributions.iter().map(|c| c.points).sum();
            let (normalized_score, method) = normalize(raw_score, max_possible, rules);
            ScoreOutcome {
                scoring_type: rules.scoring_type,
                raw_score,
                normalized_score,
                normalization_method: method,
                max_possible,
                dimension_scores: None,
                dominant_dimension: None,
                category: None,
                pair_preferences: None,
            }
        }
        ScoringType::Dimensional => {
            let dims = dimensional(template, &contributions);
            ScoreOutcome {
                scoring_type: rules.scoring_type,
                raw_score: dims.raw_score,
                normalized_score: dims.normalized_score,
                normalization_method: NormalizationMethod::Percentage,
                max_possible,
                dimension_scores: Some(dims.scores),
                dominant_dimension: dims.dominant,
                category: None,
                pair_preferences: None,
            }
        }
        ScoringType::Categorical => {
            let dims = dimensional(template, &contributions);
            let (category, dominant, pairs) = match rules.categorical_mode {
                CategoricalMode::TopDimensions => (
                    categorical_label(&dims.ranked, rules.top_dimensions),
                    dims.dominant,
                    None,
                ),
                CategoricalMode::Pairs => {
                    let pairs = pair_preferences(template, &contributions);
                    let label: String = pairs.iter().map(|p| p.preference).collect();
                    ((!label.is_empty()).then_some(label), None, Some(pairs))
                }
            };
            ScoreOutcome {
                scoring_type: rules.scoring_type,
                raw_score: dims.raw_score,
                normalized_score: dims.normalized_score,
                normalization_method: NormalizationMethod::Percentage,
                max_possible,
                dimension_scores: Some(dims.scores),
                dominant_dimension: dominant,
                category,
                pair_preferences: pairs,
            }
        }
    };

    tracing::debug!(
        template = %template.key,
        scoring = %outcome.scoring_type,
        raw = outcome.raw_score,
        normalized = outcome.normalized_score,
        "computed score"
    );
    outcome
}

/// Ceiling of the raw score: every question counts, answered or not.
pub fn max_possible(template: &TestTemplate) -> f64 {
    template
        .questions
        .iter()
        .filter(|q| q.weight > 0.0)
        .map(|q| q.bounds().1 * q.weight)
        .sum()
}

/// Answer value after reverse scoring.
pub fn effective_value(question: &Question, rules: &ScoringRules, value: f64) -> f64 {
    if is_reversed(question, rules) {
        let (min, max) = question.bounds();
        max - value + min
    } else {
        value
    }
}

fn is_reversed(question: &Question, rules: &ScoringRules) -> bool {
    question.reverse_scored || rules.reverse_questions.contains(&question.id)
}

/// Rescale `raw` with the template's normalization method.
///
/// Returns the score and the method actually applied. Without usable norms,
/// `z_score` and `percentile` fall back to `percentage`.
pub fn normalize(raw: f64, max_possible: f64, rules: &ScoringRules) -> (f64, NormalizationMethod) {
    let method = rules.normalization_method;
    let norms = rules.norms.filter(|n| n.std_dev > 0.0);

    match (method, norms) {
        (NormalizationMethod::Percentage, _) => (percentage(raw, max_possible), method),
        (NormalizationMethod::ZScore, Some(n)) => ((raw - n.mean) / n.std_dev, method),
        (NormalizationMethod::Percentile, Some(n)) => {
            let z = (raw - n.mean) / n.std_dev;
            (normal_cdf(z) * 100.0, method)
        }
        (_, None) => {
            tracing::warn!(
                method = %method,
                "no usable norms for normalization, falling back to percentage"
            );
            (
                percentage(raw, max_possible),
                NormalizationMethod::Percentage,
            )
        }
    }
}

fn percentage(raw: f64, max_possible: f64) -> f64 {
    if max_possible > 0.0 {
        raw / max_possible * 100.0
    } else {
        0.0
    }
}

/// Standard normal CDF.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Error function, Abramowitz and Stegun 7.1.26 (|error| < 1.5e-7).
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    sign * y
}

/// Concatenate the names of the `top` highest-scoring dimensions.
///
/// `ranked` must already be sorted best first. Dimensions without points are
/// left out; `None` when nothing scored.
pub fn categorical_label(ranked: &[(String, f64)], top: usize) -> Option<String> {
    let label: String = ranked
        .iter()
        .filter(|(_, s)| *s > 0.0)
        .take(top.max(1))
        .map(|(name, _)| name.as_str())
        .collect();
    (!label.is_empty()).then_some(label)
}

/// The two poles of a bipolar dimension name such as `"EI"`.
pub fn pair_poles(dimension: &str) -> Option<(char, char)> {
    let mut chars = dimension.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(first), Some(second), None) if first != second => Some((first, second)),
        _ => None,
    }
}

/// Lean of every bipolar dimension that received an answer, in declared
/// order.
///
/// Each answer pulls by its distance from the scale midpoint toward the
/// question's pole. A pair with no lean resolves to its second pole.
/// Dimensions that are not two-letter pairs are left out.
fn pair_preferences(
    template: &TestTemplate,
    contributions: &[Contribution<'_>],
) -> Vec<PairPreference> {
    dimensions_of(template)
        .into_iter()
        .filter_map(|dimension| {
            let (first, second) = pair_poles(&dimension)?;
            let in_pair = |q: &Question| {
                q.weight > 0.0 && q.dimension_pair.as_deref() == Some(dimension.as_str())
            };

            let ceiling: f64 = template
                .questions
                .iter()
                .filter(|q| in_pair(q))
                .map(|q| {
                    let (min, max) = q.bounds();
                    (max - min) / 2.0 * q.weight
                })
                .sum();

            let mut score = 0.0;
            let mut answered = false;
            for c in contributions.iter().filter(|c| in_pair(c.question)) {
                let (min, max) = c.question.bounds();
                let lean = c.points - (min + max) / 2.0 * c.question.weight;
                let toward_second = c.question.pole == Some(second);
                score += if toward_second { -lean } else { lean };
                answered = true;
            }
            if !answered {
                return None;
            }

            let confidence = if ceiling > 0.0 {
                (score.abs() / ceiling).min(1.0)
            } else {
                0.0
            };
            Some(PairPreference {
                preference: if score > 0.0 { first } else { second },
                dimension,
                score,
                confidence,
            })
        })
        .collect()
}

/// Dimensions of a template: declared ones, or the tags found on questions.
pub fn dimensions_of(template: &TestTemplate) -> Vec<String> {
    if !template.scoring_rules.dimensions.is_empty() {
        return template.scoring_rules.dimensions.clone();
    }
    let mut found: Vec<String> = Vec::new();
    for question in template.ordered_questions() {
        if let Some(dim) = &question.dimension_pair {
            if !found.contains(dim) {
                found.push(dim.clone());
            }
        }
    }
    found
}

struct Contribution<'t> {
    question: &'t Question,
    points: f64,
}

fn contributions<'t>(template: &'t TestTemplate, responses: &[Response]) -> Vec<Contribution<'t>> {
    let mut latest: HashMap<QuestionId, f64> = HashMap::new();
    for response in responses {
        match response.numeric_value() {
            Some(value) => {
                latest.insert(response.question_id, value);
            }
            None => {
                latest.remove(&response.question_id);
            }
        }
    }

    template
        .ordered_questions()
        .into_iter()
        .filter(|q| q.weight > 0.0)
        .filter_map(|q| {
            let value = *latest.get(&q.id)?;
            Some(Contribution {
                question: q,
                points: effective_value(q, &template.scoring_rules, value) * q.weight,
            })
        })
        .collect()
}

struct DimensionalScores {
    scores: BTreeMap<String, f64>,
    /// Dimensions best first; ties keep declared order.
    ranked: Vec<(String, f64)>,
    dominant: Option<String>,
    raw_score: f64,
    normalized_score: f64,
}

fn dimensional(template: &TestTemplate, contributions: &[Contribution<'_>]) -> DimensionalScores {
    let names = dimensions_of(template);
    let mut totals: Vec<(f64, usize)> = vec![(0.0, 0); names.len()];

    for c in contributions {
        let Some(dim) = &c.question.dimension_pair else {
            continue;
        };
        if let Some(i) = names.iter().position(|n| n == dim) {
            totals[i].0 += c.points;
            totals[i].1 += 1;
        }
    }

    let mut dominant: Option<(usize, f64)> = None;
    for (i, (total, count)) in totals.iter().enumerate() {
        if *count == 0 {
            continue;
        }
        match dominant {
            Some((_, best)) if *total <= best => {}
            _ => dominant = Some((i, *total)),
        }
    }

    let means: Vec<f64> = totals
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(total, count)| total / *count as f64)
        .collect();
    let normalized_score = if means.is_empty() {
        0.0
    } else {
        let mean = means.iter().sum::<f64>() / means.len() as f64;
        (mean / DIMENSION_SCALE_POINTS * 100.0).clamp(0.0, 100.0)
    };

    let mut ranked: Vec<(String, f64)> = names
        .iter()
        .cloned()
        .zip(totals.iter().map(|(total, _)| *total))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    DimensionalScores {
        scores: ranked.iter().cloned().collect(),
        raw_score: totals.iter().map(|(total, _)| total).sum(),
        dominant: dominant.map(|(i, _)| names[i].clone()),
        ranked,
        normalized_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InterpretationGuide, Norms};

    fn template(questions: Vec<Question>, rules: ScoringRules) -> TestTemplate {
        TestTemplate {
            key: "score".into(),
            name: String::new(),
            description: String::new(),
            version: None,
            questions,
            scoring_rules: rules,
            interpretation_guide: InterpretationGuide::default(),
        }
    }

    fn five_items() -> Vec<Question> {
        (1..=5).map(|i| Question::likert(i, i, 0.0, 5.0)).collect()
    }

    fn answers(values: &[f64]) -> Vec<Response> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Response::answered(i as u32 + 1, *v))
            .collect()
    }

    #[test]
    fn simple_sum_percentage() {
        let t = template(five_items(), ScoringRules::default());
        let outcome = score(&t, &answers(&[1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(outcome.raw_score, 15.0);
        assert_eq!(outcome.max_possible, 25.0);
        assert_eq!(outcome.normalized_score, 60.0);
        assert_eq!(outcome.normalization_method, NormalizationMethod::Percentage);
        assert!(outcome.dimension_scores.is_none());
    }

    #[test]
    fn skipped_questions_still_count_toward_ceiling() {
        let t = template(five_items(), ScoringRules::default());
        let mut responses = answers(&[5.0, 5.0, 5.0, 5.0]);
        responses.push(Response::skipped(5));
        let outcome = score(&t, &responses);
        assert_eq!(outcome.raw_score, 20.0);
        assert_eq!(outcome.normalized_score, 80.0);
    }

    #[test]
    fn weight_zero_and_unknown_ids_ignored() {
        let mut questions = five_items();
        questions[0].weight = 0.0;
        let t = template(questions, ScoringRules::default());
        let mut responses = answers(&[5.0, 1.0, 1.0, 1.0, 1.0]);
        responses.push(Response::answered(99, 5));
        let outcome = score(&t, &responses);
        assert_eq!(outcome.raw_score, 4.0);
        assert_eq!(outcome.max_possible, 20.0);
    }

    #[test]
    fn weighted_and_reversed() {
        let mut questions = five_items();
        questions[0].weight = 2.0;
        questions[1].reverse_scored = true;
        let rules = ScoringRules {
            scoring_type: ScoringType::WeightedSum,
            reverse_questions: vec![3],
            ..ScoringRules::default()
        };
        let t = template(questions, rules);
        // q1: 4*2, q2: 5-1+0, q3: 5-0+0, q4: 2, q5: 3
        let outcome = score(&t, &answers(&[4.0, 1.0, 0.0, 2.0, 3.0]));
        assert_eq!(outcome.raw_score, 8.0 + 4.0 + 5.0 + 2.0 + 3.0);
        assert_eq!(outcome.max_possible, 30.0);
    }

    #[test]
    fn z_score_and_percentile() {
        let mut rules = ScoringRules {
            normalization_method: NormalizationMethod::ZScore,
            norms: Some(Norms {
                mean: 10.0,
                std_dev: 5.0,
            }),
            ..ScoringRules::default()
        };
        assert_eq!(normalize(20.0, 25.0, &rules), (2.0, NormalizationMethod::ZScore));

        rules.normalization_method = NormalizationMethod::Percentile;
        let (p, method) = normalize(10.0, 25.0, &rules);
        assert_eq!(method, NormalizationMethod::Percentile);
        assert!((p - 50.0).abs() < 1e-6);
        let (p, _) = normalize(20.0, 25.0, &rules);
        assert!((p - 97.725).abs() < 0.01);
    }

    #[test]
    fn missing_norms_fall_back_to_percentage() {
        let rules = ScoringRules {
            normalization_method: NormalizationMethod::Percentile,
            ..ScoringRules::default()
        };
        assert_eq!(
            normalize(10.0, 20.0, &rules),
            (50.0, NormalizationMethod::Percentage)
        );
    }

    #[test]
    fn empty_template_scores_zero() {
        let t = template(Vec::new(), ScoringRules::default());
        let outcome = score(&t, &[]);
        assert_eq!(outcome.raw_score, 0.0);
        assert_eq!(outcome.normalized_score, 0.0);
    }

    fn disc() -> TestTemplate {
        let dims = ["D", "I", "S", "C"];
        let questions = (1..=8)
            .map(|i| {
                let mut q = Question::likert(i, i, 1.0, 5.0);
                q.dimension_pair = Some(dims[((i - 1) / 2) as usize].to_string());
                q
            })
            .collect();
        let rules = ScoringRules {
            scoring_type: ScoringType::Dimensional,
            dimensions: dims.iter().map(|d| d.to_string()).collect(),
            ..ScoringRules::default()
        };
        template(questions, rules)
    }

    #[test]
    fn dimensional_dominant_and_mean() {
        let t = disc();
        let outcome = score(&t, &answers(&[5.0, 4.0, 3.0, 3.0, 1.0, 1.0, 2.0, 2.0]));
        let dims = outcome.dimension_scores.unwrap();
        assert_eq!(dims["D"], 9.0);
        assert_eq!(dims["I"], 6.0);
        assert_eq!(dims["S"], 2.0);
        assert_eq!(dims["C"], 4.0);
        assert_eq!(outcome.dominant_dimension.as_deref(), Some("D"));
        assert_eq!(outcome.raw_score, 21.0);
        // means 4.5, 3, 1, 2 -> 2.625 / 5
        assert!((outcome.normalized_score - 52.5).abs() < 1e-9);
        assert!(outcome.category.is_none());
    }

    #[test]
    fn dimensional_tie_goes_to_first_declared() {
        let t = disc();
        let outcome = score(&t, &answers(&[3.0, 3.0, 3.0, 3.0]));
        assert_eq!(outcome.dominant_dimension.as_deref(), Some("D"));
    }

    #[test]
    fn categorical_label_from_top_dimensions() {
        let mut t = disc();
        t.scoring_rules.scoring_type = ScoringType::Categorical;
        let outcome = score(&t, &answers(&[1.0, 1.0, 5.0, 5.0, 1.0, 1.0, 4.0, 4.0]));
        assert_eq!(outcome.category.as_deref(), Some("IC"));
        assert_eq!(outcome.dominant_dimension.as_deref(), Some("I"));
    }

    #[test]
    fn dimensions_inferred_from_questions() {
        let mut t = disc();
        t.scoring_rules.dimensions.clear();
        assert_eq!(dimensions_of(&t), vec!["D", "I", "S", "C"]);
    }

    #[test]
    fn scoring_is_deterministic() {
        let t = disc();
        let responses = answers(&[2.0, 4.0, 3.0, 5.0, 1.0, 2.0, 4.0, 3.0]);
        assert_eq!(score(&t, &responses), score(&t, &responses));
    }

    fn type_pairs() -> TestTemplate {
        let tags = [("EI", 'E'), ("EI", 'I'), ("SN", 'S'), ("SN", 'N')];
        let questions = tags
            .iter()
            .zip(1u32..)
            .map(|((dim, pole), id)| {
                let mut q = Question::likert(id, id, 1.0, 5.0);
                q.dimension_pair = Some(dim.to_string());
                q.pole = Some(*pole);
                q
            })
            .collect();
        let rules = ScoringRules {
            scoring_type: ScoringType::Categorical,
            categorical_mode: CategoricalMode::Pairs,
            dimensions: vec!["EI".into(), "SN".into()],
            ..ScoringRules::default()
        };
        template(questions, rules)
    }

    #[test]
    fn pairs_take_one_pole_each() {
        let t = type_pairs();
        // EI: +2 toward E, -2 toward I counts for E. SN: -1 toward S, +1 toward N.
        let outcome = score(&t, &answers(&[5.0, 1.0, 2.0, 4.0]));
        assert_eq!(outcome.category.as_deref(), Some("EN"));
        assert!(outcome.dominant_dimension.is_none());

        let pairs = outcome.pair_preferences.unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!((pairs[0].dimension.as_str(), pairs[0].preference), ("EI", 'E'));
        assert_eq!(pairs[0].score, 4.0);
        assert_eq!(pairs[0].confidence, 1.0);
        assert_eq!((pairs[1].dimension.as_str(), pairs[1].preference), ("SN", 'N'));
        assert_eq!(pairs[1].score, -2.0);
        assert_eq!(pairs[1].confidence, 0.5);
    }

    #[test]
    fn neutral_pairs_resolve_to_second_pole() {
        let t = type_pairs();
        let outcome = score(&t, &answers(&[3.0, 3.0, 3.0, 3.0]));
        assert_eq!(outcome.category.as_deref(), Some("IN"));
        let pairs = outcome.pair_preferences.unwrap();
        assert!(pairs.iter().all(|p| p.confidence == 0.0));
    }

    #[test]
    fn unanswered_pairs_are_left_out() {
        let t = type_pairs();
        let outcome = score(&t, &answers(&[4.0, 2.0]));
        assert_eq!(outcome.category.as_deref(), Some("E"));
        assert_eq!(outcome.pair_preferences.map(|p| p.len()), Some(1));
    }

    #[test]
    fn pair_poles_need_two_distinct_letters() {
        assert_eq!(pair_poles("EI"), Some(('E', 'I')));
        assert_eq!(pair_poles("EE"), None);
        assert_eq!(pair_poles("D"), None);
        assert_eq!(pair_poles("TFX"), None);
    }

    #[test]
    fn categorical_label_skips_empty_dimensions() {
        let ranked = vec![("D".to_string(), 4.0), ("I".to_string(), 0.0)];
        assert_eq!(categorical_label(&ranked, 2).as_deref(), Some("D"));
        assert_eq!(categorical_label(&[], 2), None);
    }
}
