pub mod init;
pub mod list;
pub mod run;
pub mod tree;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use mindgauge_core::parser::{load_template_directory, parse_template};
use mindgauge_core::store::{InMemoryTemplateStore, TemplateStore};
use mindgauge_core::TestTemplate;

use crate::config::MindgaugeConfig;

/// Build the template store described by `config`: the built-in instruments
/// (unless disabled) overlaid with everything in `template_dir`.
pub async fn build_store(config: &MindgaugeConfig) -> Result<Arc<InMemoryTemplateStore>> {
    let store = if config.include_builtin {
        InMemoryTemplateStore::with_builtin()
    } else {
        InMemoryTemplateStore::new()
    };

    if let Some(dir) = config.template_dir() {
        let templates = load_template_directory(&dir)
            .with_context(|| format!("failed to load templates from {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), count = templates.len(), "loaded template directory");
        for template in templates {
            store.insert(template).await;
        }
    }

    Ok(Arc::new(store))
}

/// Resolve a `--template` argument: an existing file is parsed and added to
/// the store, anything else is treated as a template key.
pub async fn resolve_template(
    arg: &str,
    store: &InMemoryTemplateStore,
) -> Result<TestTemplate> {
    let path = Path::new(arg);
    if path.is_file() {
        let template = parse_template(path)?;
        store.insert(template.clone()).await;
        return Ok(template);
    }

    match store.fetch(arg).await? {
        Some(template) => Ok(template),
        None => anyhow::bail!(
            "template '{arg}' is neither a file nor a known key. Available: {:?}",
            store.keys().await?
        ),
    }
}
