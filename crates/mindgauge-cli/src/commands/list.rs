//! The `mindgauge list` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use mindgauge_core::rules::validate_template;
use mindgauge_core::store::TemplateStore;

use super::build_store;
use crate::config::MindgaugeConfig;

pub async fn execute(config: &MindgaugeConfig) -> Result<()> {
    let store = build_store(config).await?;
    let keys = store.keys().await?;

    if keys.is_empty() {
        println!("No templates available. Run `mindgauge init` to create an example template.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Key", "Name", "Questions", "Scoring", "Status"]);

    for key in &keys {
        let Some(template) = store.fetch(key).await? else {
            continue;
        };
        let report = validate_template(&template);
        let status = if report.is_valid {
            "valid".to_string()
        } else {
            format!("invalid ({} error(s))", report.errors.len())
        };
        table.add_row(vec![
            Cell::new(&template.key),
            Cell::new(&template.name),
            Cell::new(template.questions.len()),
            Cell::new(template.scoring_rules.scoring_type),
            Cell::new(status),
        ]);
    }

    println!("{table}");
    Ok(())
}
