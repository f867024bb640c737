//! The `mindgauge run` command.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};

use mindgauge_core::{AssessmentEngine, AssessmentResult, EngineConfig, Question, ResponseValue};

use super::{build_store, resolve_template};
use crate::config::MindgaugeConfig;

type Answers = Box<dyn Iterator<Item = Result<String>>>;

pub async fn execute(
    template: &str,
    answers: Option<String>,
    output: Option<PathBuf>,
    no_save: bool,
    format: &str,
    config: &MindgaugeConfig,
) -> Result<()> {
    if !matches!(format, "table" | "json") {
        anyhow::bail!("unknown format: {format} (expected table or json)");
    }

    let store = build_store(config).await?;
    let template = resolve_template(template, &store).await?;

    let engine = AssessmentEngine::with_config(
        store,
        EngineConfig {
            max_recommendations: config.max_recommendations,
        },
    );

    let interactive = answers.is_none();
    let mut tokens: Answers = match answers {
        Some(list) => Box::new(
            list.split(',')
                .map(|s| Ok(s.trim().to_string()))
                .collect::<Vec<_>>()
                .into_iter(),
        ),
        None => Box::new(
            std::io::stdin()
                .lock()
                .lines()
                .map(|line| line.context("failed to read answer from stdin")),
        ),
    };

    let attempt = engine.start(&template.key).await?;
    eprintln!(
        "mindgauge v{}: {} ({} questions)",
        env!("CARGO_PKG_VERSION"),
        template.name,
        template.questions.len()
    );

    loop {
        let prompt = engine.get_question(attempt).await?;
        let Some(question) = prompt.question().cloned() else {
            break;
        };
        if interactive {
            print_prompt(&question);
        }

        let Some(token) = tokens.next().transpose()? else {
            anyhow::bail!(
                "ran out of answers at question {} ({})",
                question.id,
                question.text
            );
        };

        let outcome = if token.eq_ignore_ascii_case("skip") {
            engine.skip_question(attempt, question.id).await?
        } else {
            engine
                .submit_answer(attempt, question.id, parse_answer(&token))
                .await?
        };

        if !outcome.accepted {
            let reason = outcome
                .rejection
                .map(|r| format!("[{}] {}", r.code, r.message))
                .unwrap_or_default();
            anyhow::bail!(
                "answer '{token}' rejected for question {}: {reason}",
                question.id
            );
        }
    }

    engine.get_results(attempt).await?;
    let result = engine
        .discard_attempt(attempt)
        .await?
        .context("attempt was not sealed")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_summary(&result),
    }

    if !no_save {
        let dir = output.unwrap_or_else(|| config.output_dir.clone());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory: {}", dir.display()))?;
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
        let path = dir.join(format!("result-{}-{timestamp}.json", result.template_key));
        result.save_json(&path)?;
        eprintln!("Result saved to: {}", path.display());
    }

    Ok(())
}

/// Numbers are submitted as numbers; anything else (option labels, yes/no)
/// as text.
fn parse_answer(token: &str) -> ResponseValue {
    match token.parse::<f64>() {
        Ok(n) => ResponseValue::Number(n),
        Err(_) => ResponseValue::Text(token.to_string()),
    }
}

fn print_prompt(question: &Question) {
    if let Some(description) = &question.description {
        eprintln!("{description}");
    }
    let (min, max) = question.bounds();
    eprintln!("Q{}: {} [{min}-{max}]", question.id, question.text);
    for (i, option) in question.options.iter().enumerate() {
        eprintln!("  {i}: {option}");
    }
    if !question.required {
        eprintln!("  (optional, answer \"skip\" to skip)");
    }
}

fn print_summary(result: &AssessmentResult) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);

    table.add_row(vec![Cell::new("Template"), Cell::new(&result.template_key)]);
    table.add_row(vec![
        Cell::new("Raw score"),
        Cell::new(format!("{:.2} / {:.2}", result.raw_score, result.max_possible)),
    ]);
    table.add_row(vec![
        Cell::new("Normalized score"),
        Cell::new(format!(
            "{:.2} ({})",
            result.normalized_score, result.normalization_method
        )),
    ]);
    if let Some(dimensions) = &result.dimension_scores {
        let rendered: Vec<String> = dimensions
            .iter()
            .map(|(name, score)| format!("{name}: {score:.2}"))
            .collect();
        table.add_row(vec![Cell::new("Dimensions"), Cell::new(rendered.join(", "))]);
    }
    if let Some(dominant) = &result.dominant_dimension {
        table.add_row(vec![Cell::new("Dominant"), Cell::new(dominant)]);
    }
    if let Some(category) = &result.category {
        table.add_row(vec![Cell::new("Category"), Cell::new(category)]);
    }
    if let Some(pairs) = &result.pair_preferences {
        let rendered: Vec<String> = pairs
            .iter()
            .map(|p| {
                format!(
                    "{}: {} ({:.0}%)",
                    p.dimension,
                    p.preference,
                    p.confidence * 100.0
                )
            })
            .collect();
        table.add_row(vec![Cell::new("Preferences"), Cell::new(rendered.join(", "))]);
    }
    table.add_row(vec![
        Cell::new("Interpretation"),
        Cell::new(&result.interpretation.label),
    ]);
    table.add_row(vec![Cell::new("Risk"), Cell::new(result.risk_level)]);
    if !result.fired_indicators.is_empty() {
        table.add_row(vec![
            Cell::new("Indicators"),
            Cell::new(result.fired_indicators.join(", ")),
        ]);
    }
    table.add_row(vec![
        Cell::new("Follow-up"),
        Cell::new(if result.follow_up_suggested { "yes" } else { "no" }),
    ]);
    table.add_row(vec![
        Cell::new("Answered"),
        Cell::new(format!(
            "{} ({} skipped)",
            result.answered_count, result.skipped_count
        )),
    ]);

    println!("{table}");

    if !result.recommendations.is_empty() {
        println!("\nRecommendations:");
        for r in &result.recommendations {
            println!("  - {r}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_tokens_become_numbers() {
        assert_eq!(parse_answer("3"), ResponseValue::Number(3.0));
        assert_eq!(parse_answer("2.5"), ResponseValue::Number(2.5));
        assert_eq!(
            parse_answer("Several days"),
            ResponseValue::Text("Several days".into())
        );
    }

    #[tokio::test]
    async fn builtin_key_resolves_without_files() {
        let config = MindgaugeConfig::default();
        let store = build_store(&config).await.unwrap();
        let template = resolve_template("who5", &store).await.unwrap();
        assert_eq!(template.questions.len(), 5);
        let engine = AssessmentEngine::new(store);
        assert!(engine.start("who5").await.is_ok());
    }
}
