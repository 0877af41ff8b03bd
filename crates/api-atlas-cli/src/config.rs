//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use api_atlas::adapters;
use api_atlas::{AdapterChain, BucketRule, BucketRules, IntrospectorConfig, Origin, Strategy};

use crate::error::{CliError, CliResult};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "API_ATLAS_CONFIG";

/// One service to introspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginConfig {
    pub name: String,
    /// Entity description file, relative to the config file.
    pub path: PathBuf,
}

/// The on-disk configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasConfig {
    pub origins: Vec<OriginConfig>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub share: Option<String>,
    #[serde(default)]
    pub buckets: Vec<BucketRule>,
    #[serde(default = "default_adapters")]
    pub adapters: Vec<String>,
    #[serde(skip)]
    base_dir: PathBuf,
}

fn default_adapters() -> Vec<String> {
    vec!["swagger".to_string(), "spring".to_string()]
}

impl AtlasConfig {
    /// Read a config file; origin paths resolve against its directory.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Err(CliError::ConfigNotFound(path.display().to_string()));
        }

        let raw = std::fs::read_to_string(path)?;
        let mut config: AtlasConfig = serde_json::from_str(&raw)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    pub fn from_json(raw: &str, base_dir: impl Into<PathBuf>) -> CliResult<Self> {
        let mut config: AtlasConfig = serde_json::from_str(raw)?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn strategy(&self) -> CliResult<Strategy> {
        match &self.strategy {
            Some(tag) => tag.parse().map_err(CliError::Config),
            None => Ok(Strategy::default()),
        }
    }

    pub fn origin_path(&self, origin: &OriginConfig) -> PathBuf {
        if origin.path.is_absolute() {
            origin.path.clone()
        } else {
            self.base_dir.join(&origin.path)
        }
    }

    pub fn adapter_chain(&self) -> CliResult<AdapterChain> {
        let mut chain = AdapterChain::default();
        for name in &self.adapters {
            let adapter = adapters::by_name(name)
                .ok_or_else(|| CliError::Config(format!("unknown adapter: {name}")))?;
            chain.push(adapter);
        }
        Ok(chain)
    }

    pub fn into_introspector_config(&self) -> CliResult<IntrospectorConfig> {
        let strategy = self.strategy()?;
        if self.share.is_some() && strategy != Strategy::Postfix {
            tracing::warn!("share bucket is only used by the postfix strategy");
        }

        Ok(IntrospectorConfig {
            origins: self
                .origins
                .iter()
                .map(|o| Origin::from_file(&o.name, self.origin_path(o)))
                .collect(),
            adapters: self.adapter_chain()?,
            strategy,
            share: self.share.clone(),
            buckets: BucketRules::new(self.buckets.clone()),
        })
    }
}

/// Resolve the config file path.
pub fn resolve_config_path(explicit: Option<&str>) -> String {
    if let Some(path) = explicit {
        return path.to_string();
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return env_path;
    }

    let cwd_config = PathBuf::from(".api-atlas/config.json");
    if cwd_config.exists() {
        return cwd_config.display().to_string();
    }

    resolve_default_config_path()
}

fn resolve_default_config_path() -> String {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    format!("{home}/.api-atlas/config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AtlasConfig::from_json(r#"{ "origins": [{ "name": "a", "path": "a.json" }] }"#, "/srv").unwrap();
        assert_eq!(config.strategy().unwrap(), Strategy::OnlyOrigin);
        assert_eq!(config.adapters, vec!["swagger", "spring"]);
        assert_eq!(config.origin_path(&config.origins[0]), PathBuf::from("/srv/a.json"));
    }

    #[test]
    fn test_strategy_tags() {
        let config =
            AtlasConfig::from_json(r#"{ "origins": [], "strategy": "Postfix", "share": "common" }"#, ".").unwrap();
        assert_eq!(config.strategy().unwrap(), Strategy::Postfix);

        let config = AtlasConfig::from_json(r#"{ "origins": [], "strategy": "Merge" }"#, ".").unwrap();
        assert!(matches!(config.strategy(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_unknown_adapter() {
        let config = AtlasConfig::from_json(r#"{ "origins": [], "adapters": ["jaxrs"] }"#, ".").unwrap();
        assert!(config.adapter_chain().is_err());
    }

    #[test]
    fn test_into_introspector_config() {
        let config = AtlasConfig::from_json(
            r#"{
                "origins": [{ "name": "a", "path": "a.json" }, { "name": "b", "path": "/abs/b.json" }],
                "strategy": "OnlyOrigin",
                "buckets": [{ "prefix": "com.acme.common.", "bucket": "common" }],
                "adapters": ["spring"]
            }"#,
            "/srv",
        )
        .unwrap();

        let built = config.into_introspector_config().unwrap();
        assert_eq!(built.origins.len(), 2);
        assert_eq!(built.adapters.names(), vec!["spring"]);
        assert_eq!(built.buckets.resolve("com.acme.common.Money", "a"), "common");
    }

    #[test]
    fn test_explicit_path_wins() {
        assert_eq!(resolve_config_path(Some("/tmp/atlas.json")), "/tmp/atlas.json");
    }

    #[test]
    fn test_load_missing_file() {
        let err = AtlasConfig::load(Path::new("/nonexistent/atlas.json")).unwrap_err();
        assert!(matches!(err, CliError::ConfigNotFound(_)));
    }
}
