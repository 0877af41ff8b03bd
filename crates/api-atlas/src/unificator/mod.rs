//! Merging of per-origin graphs into one.
//!
//! Every run goes through the same pipeline: the chosen strategy builds the
//! unified buckets, sources that became unreachable are reattached from the
//! per-origin graphs, provenance is written into comments, names shared by
//! several buckets are flagged, and everything is sorted.

pub mod only_origin;
pub mod postfix;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{ApiGraph, Introspection, Shape, SourceId, TypeId};

pub use only_origin::OnlyOriginStrategy;
pub use postfix::PostfixStrategy;

/// Which unification strategy to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Strategy {
    /// Merge all origins, dedupe equal shapes, and suffix conflicting names.
    Postfix,
    /// Keep each bucket's own view only.
    #[default]
    OnlyOrigin,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Postfix => write!(f, "Postfix"),
            Strategy::OnlyOrigin => write!(f, "OnlyOrigin"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "postfix" => Ok(Strategy::Postfix),
            "only_origin" | "onlyorigin" => Ok(Strategy::OnlyOrigin),
            other => Err(format!("unknown strategy: {other}")),
        }
    }
}

/// Working state shared by the pipeline steps.
#[derive(Debug, Default)]
pub struct UnificationState {
    /// Combined arenas; its buckets are the unified output.
    pub graph: ApiGraph,
    /// Buckets as each origin produced them, in origin order.
    pub originals: Vec<Introspection>,
}

impl UnificationState {
    /// Every source currently placed in a unified bucket.
    pub fn universe(&self) -> Vec<SourceId> {
        self.graph
            .introspections
            .iter()
            .flat_map(|i| i.sources.iter().copied())
            .collect()
    }
}

/// A way of turning the per-origin buckets into unified ones.
pub trait UnificationStrategy: Send + Sync {
    fn process(&self, state: &mut UnificationState);

    fn sort(&self, state: &mut UnificationState) {
        sort_graph(&mut state.graph);
    }
}

impl Strategy {
    pub fn implementation(self, share: Option<String>) -> Box<dyn UnificationStrategy> {
        match self {
            Strategy::Postfix => Box::new(PostfixStrategy::new(share)),
            Strategy::OnlyOrigin => Box::new(OnlyOriginStrategy),
        }
    }
}

/// Runs the unification pipeline over per-origin graphs.
pub struct Unificator {
    state: UnificationState,
    strategy: Box<dyn UnificationStrategy>,
}

impl Unificator {
    /// `graphs` must be in origin order; the order decides every tie.
    pub fn new(graphs: Vec<ApiGraph>, strategy: Strategy, share: Option<String>) -> Self {
        Self::with_strategy(graphs, strategy.implementation(share))
    }

    pub fn with_strategy(graphs: Vec<ApiGraph>, strategy: Box<dyn UnificationStrategy>) -> Self {
        let mut state = UnificationState::default();
        for graph in graphs {
            let buckets = state.graph.absorb(graph);
            state.originals.extend(buckets);
        }
        Self { state, strategy }
    }

    pub fn unify(mut self) -> ApiGraph {
        self.strategy.process(&mut self.state);
        reattach_missing(&mut self.state);
        annotate_provenance(&mut self.state.graph);
        flag_shared_names(&mut self.state.graph);
        self.strategy.sort(&mut self.state);

        let graph = self.state.graph;
        tracing::info!(
            "Unified {} buckets with {} sources",
            graph.introspections.len(),
            graph.introspections.iter().map(|i| i.sources.len()).sum::<usize>()
        );
        graph
    }
}

/// Put back sources that are referenced from the unified buckets but were
/// dropped by the strategy, taking them from the per-origin buckets.
pub fn reattach_missing(state: &mut UnificationState) {
    let UnificationState { graph, originals } = state;

    let mut present: HashSet<(String, String)> = HashSet::new();
    for introspection in &graph.introspections {
        let interplay = introspection.controllers.iter().flat_map(|c| c.interplay.iter());
        for &s in introspection.sources.iter().chain(interplay) {
            present.insert((introspection.origin.clone(), graph.source(s).name().to_string()));
        }
    }

    let mut reattacher = Reattacher {
        graph,
        originals: originals.as_slice(),
        present,
        missing: HashSet::new(),
    };

    let mut b = 0;
    while b < reattacher.graph.introspections.len() {
        let mut i = 0;
        while i < reattacher.graph.introspections[b].sources.len() {
            let s = reattacher.graph.introspections[b].sources[i];
            let from = reattacher.graph.source(s).added_from.clone();
            reattacher.visit_source(s, &from);
            i += 1;
        }

        let controllers: Vec<(String, Vec<TypeId>, Vec<SourceId>)> = reattacher.graph.introspections[b]
            .controllers
            .iter()
            .map(|c| {
                let sites = c.methods.iter().flat_map(|m| m.type_sites()).collect();
                (c.added_from.clone(), sites, c.interplay.clone())
            })
            .collect();
        for (from, sites, interplay) in controllers {
            for t in sites {
                reattacher.visit_type(t, &from);
            }
            for s in interplay {
                reattacher.visit_source(s, &from);
            }
        }

        b += 1;
    }
}

struct Reattacher<'s> {
    graph: &'s mut ApiGraph,
    originals: &'s [Introspection],
    present: HashSet<(String, String)>,
    missing: HashSet<(String, String)>,
}

impl Reattacher<'_> {
    fn visit_source(&mut self, s: SourceId, from: &str) {
        for t in self.graph.source(s).shape.type_sites() {
            self.visit_type(t, from);
        }
    }

    fn visit_type(&mut self, t: TypeId, from: &str) {
        for g in self.graph.ty(t).generics.clone() {
            self.visit_type(g, from);
        }

        let ty = self.graph.ty(t);
        if !ty.kind.is_named() {
            return;
        }
        let key = (ty.origin.clone(), ty.name.clone());
        if self.present.contains(&key) || self.missing.contains(&key) {
            return;
        }

        let Some(found) = self.find_original(&key.0, &key.1, from) else {
            self.missing.insert(key);
            return;
        };

        tracing::debug!("Reattaching {} to bucket {}", key.1, key.0);
        self.graph.move_source(found, &key.0);
        self.graph
            .introspection_or_insert(&key.0, &key.0)
            .sources
            .push(found);
        self.graph.attach_usage(found, t);
        self.present.insert(key);

        self.visit_source(found, from);
    }

    /// Search the per-origin buckets, preferring the one discovered by the
    /// same origin as the dependant.
    fn find_original(&self, origin: &str, name: &str, from: &str) -> Option<SourceId> {
        let mut fallback = None;
        for introspection in self.originals.iter().filter(|i| i.origin == origin) {
            let Some(found) = introspection
                .sources
                .iter()
                .copied()
                .find(|&s| self.graph.source(s).name() == name)
            else {
                continue;
            };
            if introspection.added_from == from {
                return Some(found);
            }
            fallback.get_or_insert(found);
        }
        fallback
    }
}

/// Write `@addedFrom <origin>` into every source living outside the origin
/// that discovered it.
pub fn annotate_provenance(graph: &mut ApiGraph) {
    let placed: Vec<(String, SourceId)> = graph.bucket_sources();
    for (bucket, s) in placed {
        let source = graph.source_mut(s);
        if source.added_from != bucket {
            let line = format!("@addedFrom {}", source.added_from);
            source.shape.annotate(&line);
        }
    }
}

/// Flag sources and controllers whose names appear in more than one bucket.
pub fn flag_shared_names(graph: &mut ApiGraph) {
    let mut buckets_by_name: HashMap<String, HashSet<String>> = HashMap::new();
    for (bucket, s) in graph.bucket_sources() {
        buckets_by_name
            .entry(graph.source(s).name().to_string())
            .or_default()
            .insert(bucket);
    }

    for (_, s) in graph.bucket_sources() {
        let shared = buckets_by_name
            .get(graph.source(s).name())
            .is_some_and(|b| b.len() > 1);
        if shared {
            graph.flag_duplicate(s);
        }
    }

    let mut controllers_by_name: HashMap<String, usize> = HashMap::new();
    for introspection in &graph.introspections {
        let names: HashSet<&str> = introspection.controllers.iter().map(|c| c.name.as_str()).collect();
        for name in names {
            *controllers_by_name.entry(name.to_string()).or_default() += 1;
        }
    }
    for introspection in &mut graph.introspections {
        for controller in &mut introspection.controllers {
            if controllers_by_name.get(&controller.name).is_some_and(|&n| n > 1) {
                controller.is_duplicate = true;
            }
        }
    }
}

/// Sort controllers, methods, sources, fields, and enum values by name.
pub fn sort_graph(graph: &mut ApiGraph) {
    let ApiGraph {
        sources, introspections, ..
    } = graph;

    for introspection in introspections.iter_mut() {
        introspection
            .sources
            .sort_by(|a, b| sources[a.0].name().cmp(sources[b.0].name()));
        introspection.controllers.sort_by(|a, b| a.name.cmp(&b.name));
        for controller in &mut introspection.controllers {
            controller
                .methods
                .sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
            controller
                .interplay
                .sort_by(|a, b| sources[a.0].name().cmp(sources[b.0].name()));
        }
    }

    for source in sources.iter_mut() {
        match &mut source.shape {
            Shape::Interface(i) => i.fields.sort_by(|a, b| a.name.cmp(&b.name)),
            Shape::Enumeration(e) => e.values.sort_by(|a, b| a.key.cmp(&b.key)),
        }
    }
}

/// Group `ids` by source name, keeping groups and members in input order.
pub(crate) fn group_by_name(graph: &ApiGraph, ids: &[SourceId]) -> Vec<Vec<SourceId>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<SourceId>> = HashMap::new();
    for &s in ids {
        let name = graph.source(s).name().to_string();
        groups
            .entry(name.clone())
            .or_insert_with(|| {
                order.push(name);
                Vec::new()
            })
            .push(s);
    }
    order
        .into_iter()
        .filter_map(|name| groups.remove(&name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Interface, Source, Type, TypeKind};

    fn add(graph: &mut ApiGraph, bucket: &str, from: &str, name: &str) -> SourceId {
        let id = graph.add_source(Source {
            origin: bucket.into(),
            added_from: from.into(),
            shape: Shape::Interface(Interface::new(name, "")),
            used_in: Vec::new(),
        });
        graph.introspection_or_insert(bucket, bucket).sources.push(id);
        id
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("postfix".parse::<Strategy>().unwrap(), Strategy::Postfix);
        assert_eq!("only-origin".parse::<Strategy>().unwrap(), Strategy::OnlyOrigin);
        assert!("merge".parse::<Strategy>().is_err());
        assert_eq!(Strategy::default(), Strategy::OnlyOrigin);
    }

    #[test]
    fn test_strategy_tags_round_trip() {
        for strategy in [Strategy::Postfix, Strategy::OnlyOrigin] {
            let tag = strategy.to_string();
            assert_eq!(tag.parse::<Strategy>().unwrap(), strategy);
            assert_eq!(serde_json::to_value(strategy).unwrap(), serde_json::json!(tag));
        }
        assert_eq!(Strategy::OnlyOrigin.to_string(), "OnlyOrigin");
        assert_eq!(
            serde_json::from_str::<Strategy>("\"Postfix\"").unwrap(),
            Strategy::Postfix
        );
    }

    #[test]
    fn test_provenance_annotation() {
        let mut graph = ApiGraph::new();
        let native = add(&mut graph, "a", "a", "User");
        let foreign = add(&mut graph, "common", "a", "Money");

        annotate_provenance(&mut graph);
        annotate_provenance(&mut graph);

        assert_eq!(graph.source(native).shape.comment(), "");
        assert_eq!(graph.source(foreign).shape.comment(), "@addedFrom a");
    }

    #[test]
    fn test_shared_names_flagged() {
        let mut graph = ApiGraph::new();
        let a = add(&mut graph, "a", "a", "User");
        let b = add(&mut graph, "b", "b", "User");
        let c = add(&mut graph, "b", "b", "Order");
        let t = graph.add_type(Type::new(TypeKind::Entity, "User", "b"));
        graph.attach_usage(b, t);

        flag_shared_names(&mut graph);

        assert!(graph.source(a).shape.is_duplicate());
        assert!(graph.source(b).shape.is_duplicate());
        assert!(graph.ty(t).is_duplicate);
        assert!(!graph.source(c).shape.is_duplicate());
    }

    #[test]
    fn test_group_by_name_keeps_order() {
        let mut graph = ApiGraph::new();
        let x1 = add(&mut graph, "a", "a", "X");
        let y = add(&mut graph, "a", "a", "Y");
        let x2 = add(&mut graph, "b", "b", "X");

        let groups = group_by_name(&graph, &[x1, y, x2]);
        assert_eq!(groups, vec![vec![x1, x2], vec![y]]);
    }

    #[test]
    fn test_sort_graph() {
        let mut graph = ApiGraph::new();
        let z = add(&mut graph, "a", "a", "Zebra");
        let a = add(&mut graph, "a", "a", "Ant");

        sort_graph(&mut graph);
        assert_eq!(graph.introspection("a").unwrap().sources, vec![a, z]);
    }
}
