//! Template file parser.
//!
//! Loads templates from TOML or JSON files (chosen by extension) and from
//! directories of such files.

use std::path::Path;

use anyhow::{Context, Result};

use crate::model::TestTemplate;

/// Template file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Toml,
    Json,
}

impl TemplateFormat {
    /// Format implied by a path's extension, if supported.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(TemplateFormat::Toml),
            "json" => Some(TemplateFormat::Json),
            _ => None,
        }
    }
}

/// Parse a single template file.
pub fn parse_template(path: &Path) -> Result<TestTemplate> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template file: {}", path.display()))?;

    parse_template_str(&content, path)
}

/// Parse template content; `source_path` picks the format and labels errors.
pub fn parse_template_str(content: &str, source_path: &Path) -> Result<TestTemplate> {
    let Some(format) = TemplateFormat::from_path(source_path) else {
        anyhow::bail!(
            "unsupported template format (expected .toml or .json): {}",
            source_path.display()
        );
    };

    let template: TestTemplate = match format {
        TemplateFormat::Toml => toml::from_str(content)
            .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?,
        TemplateFormat::Json => serde_json::from_str(content)
            .with_context(|| format!("failed to parse JSON: {}", source_path.display()))?,
    };

    if template.key.trim().is_empty() {
        anyhow::bail!("template key is empty: {}", source_path.display());
    }

    Ok(template)
}

/// Recursively load every `.toml` and `.json` template in a directory.
///
/// Files that fail to parse are skipped with a warning. Results are sorted
/// by key.
pub fn load_template_directory(dir: &Path) -> Result<Vec<TestTemplate>> {
    let mut templates = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        paths.push(entry?.path());
    }
    paths.sort();

    for path in paths {
        if path.is_dir() {
            templates.extend(load_template_directory(&path)?);
        } else if TemplateFormat::from_path(&path).is_some() {
            match parse_template(&path) {
                Ok(template) => templates.push(template),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    templates.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionOperator;
    use crate::model::{NormalizationMethod, QuestionType, ScoringType};
    use tempfile::TempDir;

    const SAMPLE_TOML: &str = r#"
key = "sleep"
name = "Sleep check"

[[questions]]
id = 1
order = 1
text = "How often do you wake up at night?"
min_value = 0
max_value = 4

[[questions]]
id = 2
order = 2
text = "Do you feel rested?"
question_type = "boolean"
show_if_question_id = 1
show_if_value = 3
show_if_operator = "lt"

[scoring_rules]
type = "weighted_sum"
normalization_method = "percentage"

[[interpretation_guide.score_ranges]]
min_score = 0
max_score = 100
label = "any"
"#;

    #[test]
    fn parse_toml_template() {
        let t = parse_template_str(SAMPLE_TOML, Path::new("sleep.toml")).unwrap();
        assert_eq!(t.key, "sleep");
        assert_eq!(t.questions.len(), 2);
        assert_eq!(t.questions[0].max_value, 4.0);
        assert_eq!(t.questions[1].question_type, QuestionType::Boolean);
        assert_eq!(t.questions[1].show_if_operator, ConditionOperator::Lt);
        assert_eq!(t.scoring_rules.scoring_type, ScoringType::WeightedSum);
        assert_eq!(
            t.scoring_rules.normalization_method,
            NormalizationMethod::Percentage
        );
        assert_eq!(t.interpretation_guide.score_ranges[0].label, "any");
    }

    #[test]
    fn parse_json_template() {
        let json = r#"{
            "key": "mini",
            "questions": [{"id": 1, "order": 1, "weight": 2}],
            "scoring_rules": {"type": "simple_sum"}
        }"#;
        let t = parse_template_str(json, Path::new("mini.JSON")).unwrap();
        assert_eq!(t.key, "mini");
        assert_eq!(t.questions[0].weight, 2.0);
    }

    #[test]
    fn rejects_unknown_extension_and_empty_key() {
        assert!(parse_template_str("key = \"x\"", Path::new("x.yaml")).is_err());
        assert!(parse_template_str("key = \"  \"", Path::new("x.toml")).is_err());
    }

    #[test]
    fn invalid_toml_mentions_path() {
        let err = parse_template_str("key = ", Path::new("broken.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("broken.toml"));
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sleep.toml"), SAMPLE_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "key = ").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("more");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("a.json"), r#"{"key": "alpha"}"#).unwrap();

        let templates = load_template_directory(dir.path()).unwrap();
        let keys: Vec<_> = templates.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "sleep"]);
    }

    #[test]
    fn load_directory_requires_directory() {
        let dir = TempDir::new().unwrap();
        assert!(load_template_directory(&dir.path().join("missing")).is_err());
    }
}
