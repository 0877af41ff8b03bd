//! Parsing of one origin's entity description into its own graph.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapter::AdapterChain;
use crate::controller::ControllerBuilder;
use crate::entity::{Description, EntityIndex};
use crate::type_graph::TypeGraphBuilder;
use crate::types::{ApiGraph, AtlasResult};

/// Route entity paths starting with `prefix` into `bucket`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRule {
    pub prefix: String,
    pub bucket: String,
}

/// Ordered bucket rules; the first matching prefix wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRules {
    rules: Vec<BucketRule>,
}

impl BucketRules {
    pub fn new(rules: Vec<BucketRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[BucketRule] {
        &self.rules
    }

    /// Bucket for an entity path parsed by `origin`.
    pub fn resolve(&self, path: &str, origin: &str) -> String {
        self.rules
            .iter()
            .find(|r| !r.prefix.is_empty() && path.starts_with(&r.prefix))
            .map(|r| r.bucket.clone())
            .unwrap_or_else(|| origin.to_string())
    }
}

/// Parses a single origin. Parsers share nothing mutable, so several can run
/// at once.
#[derive(Debug, Clone)]
pub struct OriginParser {
    origin: String,
    adapters: Arc<AdapterChain>,
    buckets: Arc<BucketRules>,
}

impl OriginParser {
    pub fn new(origin: impl Into<String>, adapters: Arc<AdapterChain>, buckets: Arc<BucketRules>) -> Self {
        Self {
            origin: origin.into(),
            adapters,
            buckets,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Build the per-origin graph: one controller per entry point, plus any
    /// entities the adapters ask to load regardless of use.
    pub fn parse(&self, description: &Description) -> AtlasResult<ApiGraph> {
        let index = EntityIndex::new(description);
        let mut builder = TypeGraphBuilder::new(&self.origin, &index, &self.adapters, &self.buckets);

        let entries = self.adapters.query_entry_points(description, &self.origin);
        tracing::debug!("Origin {} has {} entry points", self.origin, entries.len());

        for entry in entries {
            ControllerBuilder::new(&mut builder).build(entry)?;
        }

        for extra in self.adapters.load_additional_data(description, &self.origin) {
            builder.register_entity(extra)?;
        }

        let graph = builder.into_graph();
        tracing::info!(
            "Parsed origin {}: {} buckets, {} sources",
            self.origin,
            graph.introspections.len(),
            graph.sources.len()
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Adapter;
    use crate::entity::Entity;
    use serde_json::json;

    struct LoadAll;

    impl Adapter for LoadAll {
        fn name(&self) -> &str {
            "load-all"
        }

        fn load_additional_data<'a>(
            &self,
            description: &'a Description,
            mut previous: Vec<&'a Entity>,
            _origin: &str,
        ) -> Vec<&'a Entity> {
            previous.extend(description.entities());
            previous
        }
    }

    #[test]
    fn test_bucket_rules_first_match() {
        let rules = BucketRules::new(vec![
            BucketRule {
                prefix: "com.acme.common".into(),
                bucket: "common".into(),
            },
            BucketRule {
                prefix: "com.acme".into(),
                bucket: "acme".into(),
            },
        ]);

        assert_eq!(rules.resolve("com.acme.common.Money", "billing"), "common");
        assert_eq!(rules.resolve("com.acme.User", "billing"), "acme");
        assert_eq!(rules.resolve("org.other.Thing", "billing"), "billing");
    }

    #[test]
    fn test_additional_data_split_across_buckets() {
        let description: Description = serde_json::from_value(json!({
            "Modules": { "com": { "Exports": {
                "Money": { "Kind": "Class", "Name": "Money", "Path": "com.acme.common.Money" },
                "Invoice": { "Kind": "Class", "Name": "Invoice", "Path": "com.acme.billing.Invoice",
                    "Fields": [{ "Name": "total", "Type": { "Name": "Money", "Path": "com.acme.common.Money" } }] }
            }}}
        }))
        .unwrap();

        let rules = BucketRules::new(vec![BucketRule {
            prefix: "com.acme.common".into(),
            bucket: "common".into(),
        }]);
        let parser = OriginParser::new(
            "billing",
            Arc::new(AdapterChain::new(vec![Arc::new(LoadAll)])),
            Arc::new(rules),
        );

        let graph = parser.parse(&description).unwrap();
        let common = graph.introspection("common").unwrap();
        let billing = graph.introspection("billing").unwrap();

        assert_eq!(common.added_from, "billing");
        assert_eq!(common.sources.len(), 1);
        assert_eq!(billing.sources.len(), 1);
        assert!(graph.dangling_references().is_empty());
    }
}
