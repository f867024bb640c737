//! The `mindgauge tree` command.

use anyhow::Result;

use mindgauge_core::rules::{branching_tree, BranchingTree};

use super::{build_store, resolve_template};
use crate::config::MindgaugeConfig;

pub async fn execute(template: &str, format: &str, config: &MindgaugeConfig) -> Result<()> {
    let store = build_store(config).await?;
    let template = resolve_template(template, &store).await?;

    // Not admitted: templates failing validation still get a tree.
    let tree = branching_tree(&template);

    match format {
        "text" => print_text(&tree),
        "json" => println!("{}", serde_json::to_string_pretty(&tree)?),
        other => anyhow::bail!("unknown format: {other} (expected text or json)"),
    }

    Ok(())
}

fn print_text(tree: &BranchingTree) {
    println!(
        "Branching tree: {} ({} questions, {} branches)",
        tree.template_key,
        tree.questions.len(),
        tree.branches.len()
    );

    for node in &tree.questions {
        let visibility = match tree.branches.iter().find(|b| b.to == node.id) {
            Some(branch) => format!("shown if Q{} {}", branch.from, branch.condition),
            None => "always shown".to_string(),
        };
        println!("Q{} ({visibility}) {}", node.id, node.text);

        for branch in tree.branches.iter().filter(|b| b.from == node.id) {
            println!("  -> Q{} when {}", branch.to, branch.condition);
        }
    }
}
