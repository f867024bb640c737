//! CLI configuration (`mindgauge.toml`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Top-level mindgauge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MindgaugeConfig {
    /// Directory of template files served alongside the built-ins.
    #[serde(default)]
    pub template_dir: Option<String>,
    /// Serve the built-in instruments (WHO-5, GAD-7).
    #[serde(default = "default_include_builtin")]
    pub include_builtin: bool,
    /// Output directory for result files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Global cap on recommendations per result.
    #[serde(default)]
    pub max_recommendations: Option<usize>,
}

fn default_include_builtin() -> bool {
    true
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./mindgauge-results")
}
fn default_log_filter() -> String {
    "mindgauge=info".to_string()
}

impl Default for MindgaugeConfig {
    fn default() -> Self {
        Self {
            template_dir: None,
            include_builtin: default_include_builtin(),
            output_dir: default_output_dir(),
            log_filter: default_log_filter(),
            max_recommendations: None,
        }
    }
}

impl MindgaugeConfig {
    /// The template directory with environment references expanded.
    pub fn template_dir(&self) -> Option<PathBuf> {
        self.template_dir
            .as_deref()
            .map(resolve_env_vars)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not rescanned.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Load config from an explicit path, or `mindgauge.toml` in the current
/// directory. Falls back to defaults when neither exists.
///
/// `MINDGAUGE_TEMPLATE_DIR` overrides `template_dir`.
pub fn load_config_from(path: Option<&Path>) -> Result<MindgaugeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("mindgauge.toml");
            local.exists().then_some(local)
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<MindgaugeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => MindgaugeConfig::default(),
    };

    if let Ok(dir) = std::env::var("MINDGAUGE_TEMPLATE_DIR") {
        config.template_dir = Some(dir);
    }

    Ok(config)
}
