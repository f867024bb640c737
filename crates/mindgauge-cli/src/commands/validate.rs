//! The `mindgauge validate` command.

use std::path::PathBuf;

use anyhow::Result;

use mindgauge_core::parser;
use mindgauge_core::rules::validate_template;

pub fn execute(template_path: PathBuf) -> Result<()> {
    let templates = if template_path.is_dir() {
        parser::load_template_directory(&template_path)?
    } else {
        vec![parser::parse_template(&template_path)?]
    };

    let mut invalid = 0;
    let mut total_warnings = 0;

    for template in &templates {
        println!(
            "Template: {} [{}] ({} questions)",
            template.name,
            template.key,
            template.questions.len()
        );

        let report = validate_template(template);
        for error in &report.errors {
            println!("  ERROR: {error}");
        }
        for w in &report.warnings {
            let prefix = w
                .question_id
                .map(|id| format!("  [Q{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }

        if !report.is_valid {
            invalid += 1;
        }
        total_warnings += report.warnings.len();
    }

    if invalid > 0 {
        anyhow::bail!("{invalid} of {} template(s) invalid", templates.len());
    }

    if total_warnings == 0 {
        println!("All templates valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
