//! Subcommand implementations. Each returns data; printing is left to `main`.

use std::path::Path;

use serde::Serialize;
use serde_json::json;

use api_atlas::adapters;
use api_atlas::{Document, DocumentWriter, Introspector, Strategy};

use crate::config::{resolve_config_path, AtlasConfig};
use crate::error::CliResult;

/// Counts reported after a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub buckets: usize,
    pub sources: usize,
    pub controllers: usize,
    pub methods: usize,
    pub dangling: usize,
}

impl BuildSummary {
    fn of(document: &Document, dangling: usize) -> Self {
        Self {
            buckets: document.buckets.len(),
            sources: document.source_count(),
            controllers: document.controller_count(),
            methods: document.method_count(),
            dangling,
        }
    }
}

/// Build the unified graph and write its document to `output`, or to stdout.
pub async fn build(config: &AtlasConfig, output: Option<&Path>) -> CliResult<BuildSummary> {
    let graph = Introspector::build(config.into_introspector_config()?).await?;

    let dangling = graph.dangling_references().len();
    if dangling > 0 {
        tracing::warn!("{dangling} type references have no backing source");
    }

    match output {
        Some(path) => {
            DocumentWriter::write_to_file(&graph, path)?;
            tracing::info!("Wrote {}", path.display());
        }
        None => {
            let stdout = std::io::stdout();
            DocumentWriter::write_to(&graph, &mut stdout.lock())?;
        }
    }

    Ok(BuildSummary::of(&Document::from_graph(&graph), dangling))
}

/// Per-origin result of a validation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginReport {
    pub name: String,
    pub buckets: Vec<String>,
    pub sources: usize,
    pub controllers: usize,
}

/// Load and parse every origin without unifying.
pub async fn validate(config: &AtlasConfig) -> CliResult<Vec<OriginReport>> {
    let introspector = config.into_introspector_config()?;
    let graphs = Introspector::parse_origins(&introspector).await?;

    Ok(introspector
        .origins
        .iter()
        .zip(&graphs)
        .map(|(origin, graph)| OriginReport {
            name: origin.name.clone(),
            buckets: graph.introspections.iter().map(|i| i.origin.clone()).collect(),
            sources: graph.sources.len(),
            controllers: graph.introspections.iter().map(|i| i.controllers.len()).sum(),
        })
        .collect())
}

/// Static description of the tool plus the resolved config location.
pub fn info(explicit_config: Option<&str>) -> serde_json::Value {
    let config_path = resolve_config_path(explicit_config);
    let loaded = AtlasConfig::load(Path::new(&config_path)).ok();

    json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "strategies": [Strategy::OnlyOrigin.to_string(), Strategy::Postfix.to_string()],
        "default_strategy": Strategy::default().to_string(),
        "adapters": (["swagger", "spring"]
            .iter()
            .filter(|n| adapters::by_name(n).is_some())
            .collect::<Vec<_>>()),
        "config": config_path,
        "config_found": loaded.is_some(),
        "origins": (loaded
            .map(|c| c.origins.iter().map(|o| o.name.clone()).collect::<Vec<_>>())
            .unwrap_or_default()),
    })
}
