//! Template stores.
//!
//! The engine reads templates through [`TemplateStore`]; where they live is
//! the store's business.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::catalog;
use crate::model::TestTemplate;
use crate::parser::load_template_directory;

/// Source of template definitions.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Human-readable store name (e.g. "memory").
    fn name(&self) -> &str;

    /// Fetch a template by key. `Ok(None)` when the key is unknown.
    async fn fetch(&self, key: &str) -> Result<Option<TestTemplate>>;

    /// Keys of every template this store can serve, sorted.
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Templates held in memory.
#[derive(Debug, Default)]
pub struct InMemoryTemplateStore {
    templates: RwLock<BTreeMap<String, TestTemplate>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with `templates`. Later duplicates replace earlier ones.
    pub fn from_templates(templates: impl IntoIterator<Item = TestTemplate>) -> Self {
        let map = templates
            .into_iter()
            .map(|t| (t.key.clone(), t))
            .collect();
        Self {
            templates: RwLock::new(map),
        }
    }

    /// A store preloaded with the built-in instruments.
    pub fn with_builtin() -> Self {
        Self::from_templates(catalog::builtin())
    }

    /// Add or replace a template.
    pub async fn insert(&self, template: TestTemplate) {
        self.templates
            .write()
            .await
            .insert(template.key.clone(), template);
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, key: &str) -> Result<Option<TestTemplate>> {
        Ok(self.templates.read().await.get(key).cloned())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.templates.read().await.keys().cloned().collect())
    }
}

/// Templates read from a directory of TOML/JSON files on each lookup.
#[derive(Debug, Clone)]
pub struct DirectoryTemplateStore {
    dir: PathBuf,
}

impl DirectoryTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn load(&self) -> Result<Vec<TestTemplate>> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || load_template_directory(&dir))
            .await
            .context("template loading task failed")?
    }
}

#[async_trait]
impl TemplateStore for DirectoryTemplateStore {
    fn name(&self) -> &str {
        "directory"
    }

    async fn fetch(&self, key: &str) -> Result<Option<TestTemplate>> {
        Ok(self.load().await?.into_iter().find(|t| t.key == key))
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.load().await?.into_iter().map(|t| t.key).collect())
    }
}
