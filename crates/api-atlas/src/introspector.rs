//! Entry point: load every origin concurrently, parse, and unify.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::adapter::AdapterChain;
use crate::entity::Description;
use crate::origin::{BucketRules, OriginParser};
use crate::types::{ApiGraph, AtlasError, AtlasResult};
use crate::unificator::{Strategy, Unificator};

/// Supplies the entity description of one origin.
#[async_trait]
pub trait EntityProvider: Send + Sync {
    async fn load(&self) -> AtlasResult<Description>;
}

/// Reads a description from a JSON file.
#[derive(Debug, Clone)]
pub struct FileProvider {
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EntityProvider for FileProvider {
    async fn load(&self) -> AtlasResult<Description> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Serves a description already in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    description: Description,
}

impl StaticProvider {
    pub fn new(description: Description) -> Self {
        Self { description }
    }
}

#[async_trait]
impl EntityProvider for StaticProvider {
    async fn load(&self) -> AtlasResult<Description> {
        Ok(self.description.clone())
    }
}

/// A named origin and where its description comes from.
#[derive(Clone)]
pub struct Origin {
    pub name: String,
    pub provider: Arc<dyn EntityProvider>,
}

impl Origin {
    pub fn new(name: impl Into<String>, provider: Arc<dyn EntityProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }

    pub fn from_file(name: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self::new(name, Arc::new(FileProvider::new(path)))
    }

    pub fn from_description(name: impl Into<String>, description: Description) -> Self {
        Self::new(name, Arc::new(StaticProvider::new(description)))
    }
}

impl std::fmt::Debug for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Origin").field("name", &self.name).finish()
    }
}

/// Everything one build needs.
#[derive(Debug, Clone, Default)]
pub struct IntrospectorConfig {
    /// Origins in priority order; the order decides every tie.
    pub origins: Vec<Origin>,
    pub adapters: AdapterChain,
    pub strategy: Strategy,
    /// Bucket that receives sources shared by several origins (postfix only).
    pub share: Option<String>,
    pub buckets: BucketRules,
}

impl IntrospectorConfig {
    pub fn validate(&self) -> AtlasResult<()> {
        if self.origins.is_empty() {
            return Err(AtlasError::InvalidInput("no origins configured".into()));
        }
        for (i, origin) in self.origins.iter().enumerate() {
            if origin.name.trim().is_empty() {
                return Err(AtlasError::InvalidInput(format!("origin #{i} has an empty name")));
            }
            if self.origins[..i].iter().any(|o| o.name == origin.name) {
                return Err(AtlasError::InvalidInput(format!(
                    "origin {} is configured twice",
                    origin.name
                )));
            }
        }
        Ok(())
    }
}

/// Builds the unified graph from a configuration.
pub struct Introspector;

impl Introspector {
    /// Load and parse all origins concurrently, then unify them.
    pub async fn build(config: IntrospectorConfig) -> AtlasResult<ApiGraph> {
        let graphs = Self::parse_origins(&config).await?;
        Ok(Unificator::new(graphs, config.strategy, config.share.clone()).unify())
    }

    /// Per-origin graphs in origin order. Any failure fails the whole batch.
    pub async fn parse_origins(config: &IntrospectorConfig) -> AtlasResult<Vec<ApiGraph>> {
        config.validate()?;

        let adapters = Arc::new(config.adapters.clone());
        let buckets = Arc::new(config.buckets.clone());

        tracing::info!(
            "Building {} origins with {} strategy",
            config.origins.len(),
            config.strategy
        );

        let tasks = config.origins.iter().map(|origin| {
            let parser = OriginParser::new(&origin.name, adapters.clone(), buckets.clone());
            let provider = origin.provider.clone();
            let handle = tokio::spawn(async move {
                let description = provider.load().await.map_err(|e| AtlasError::OriginLoad {
                    origin: parser.origin().to_string(),
                    reason: e.to_string(),
                })?;
                parser.parse(&description)
            });

            async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(AtlasError::Task(e.to_string())),
                }
            }
        });

        try_join_all(tasks).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, Module};

    fn description(entity: &str) -> Description {
        let mut module = Module::default();
        module.exports.insert(
            entity.to_string(),
            Entity {
                kind: "Class".into(),
                name: entity.into(),
                path: format!("m.{entity}"),
                ..Entity::default()
            },
        );
        let mut description = Description::default();
        description.modules.insert("m".into(), module);
        description
    }

    #[tokio::test]
    async fn test_missing_file_fails_build() {
        let config = IntrospectorConfig {
            origins: vec![
                Origin::from_description("a", description("User")),
                Origin::from_file("b", "/nonexistent/description.json"),
            ],
            ..IntrospectorConfig::default()
        };

        let err = Introspector::build(config).await.unwrap_err();
        match err {
            AtlasError::OriginLoad { origin, .. } => assert_eq!(origin, "b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_file_provider_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        std::fs::write(&path, serde_json::to_string(&description("User")).unwrap()).unwrap();

        let loaded = FileProvider::new(&path).load().await.unwrap();
        assert_eq!(loaded.entities().len(), 1);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let config = IntrospectorConfig {
            origins: vec![
                Origin::from_description("a", Description::default()),
                Origin::from_description("a", Description::default()),
            ],
            ..IntrospectorConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(IntrospectorConfig::default().validate().is_err());
    }

    #[tokio::test]
    async fn test_graphs_in_origin_order() {
        let config = IntrospectorConfig {
            origins: vec![
                Origin::from_description("first", description("A")),
                Origin::from_description("second", description("B")),
            ],
            ..IntrospectorConfig::default()
        };

        let graphs = Introspector::parse_origins(&config).await.unwrap();
        assert_eq!(graphs.len(), 2);
    }
}
