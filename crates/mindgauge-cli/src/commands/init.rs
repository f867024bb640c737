//! The `mindgauge init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("mindgauge.toml").exists() {
        println!("mindgauge.toml already exists, skipping.");
    } else {
        std::fs::write("mindgauge.toml", SAMPLE_CONFIG)?;
        println!("Created mindgauge.toml");
    }

    std::fs::create_dir_all("templates")?;
    let example_path = std::path::Path::new("templates/example.toml");
    if example_path.exists() {
        println!("templates/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_TEMPLATE)?;
        println!("Created templates/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit templates/example.toml or add your own templates");
    println!("  2. Run: mindgauge validate --template templates");
    println!("  3. Run: mindgauge run --template templates/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# mindgauge configuration

template_dir = "templates"
include_builtin = true
output_dir = "./mindgauge-results"
log_filter = "mindgauge=info"
# max_recommendations = 5
"#;

const EXAMPLE_TEMPLATE: &str = r##"key = "stress-check"
name = "Stress Check"
description = "Short stress screen with a follow-up branch for frequent stress"
version = "1.0"

[[questions]]
id = 1
order = 1
text = "How often have you felt stressed in the past week?"
min_value = 0
max_value = 4

[[questions]]
id = 2
order = 2
text = "How much does stress interfere with your sleep?"
min_value = 0
max_value = 4
show_if_question_id = 1
show_if_value = 3
show_if_operator = "gte"

[[questions]]
id = 3
order = 3
text = "How well are you coping overall?"
min_value = 0
max_value = 4
reverse_scored = true

[[questions]]
id = 4
order = 4
text = "On how many of the last four days did you exercise?"
min_value = 0
max_value = 4
weight = 0
required = false

[scoring_rules]
type = "simple_sum"
normalization_method = "percentage"

[interpretation_guide]
score_basis = "raw"

[[interpretation_guide.score_ranges]]
min_score = 0
max_score = 4
label = "low"
description = "Low stress"
color = "#28a745"
recommendations = ["Keep up your current routines"]

[[interpretation_guide.score_ranges]]
min_score = 5
max_score = 8
label = "moderate"
description = "Moderate stress"
color = "#ffc107"
recommendations = ["Schedule regular breaks and relaxation"]

[[interpretation_guide.score_ranges]]
min_score = 9
max_score = 12
label = "high"
description = "High stress"
color = "#dc3545"
recommendations = ["Consider talking to a professional about stress"]
follow_up = true

[[interpretation_guide.recommendation_rules]]
condition = "score >= 6 and score <= 8"
recommendations = ["Try a short daily mindfulness exercise"]

[[interpretation_guide.risk_indicators]]
name = "sleep disruption"
description = "Stress severely disrupts sleep"
question_ids = [2]
thresholds = [4]
risk_level = "moderate"
"##;
