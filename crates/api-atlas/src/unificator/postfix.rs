//! Merge every origin's view, dedupe equal shapes, and rename the rest.
//!
//! Inside one bucket, two sources with the same name either collapse into
//! one (equal shapes, usages merged) or the copy not discovered by the
//! bucket's own origin gets a `__<addedFrom>` suffix. Across buckets, equal
//! same-named sources are consolidated into a single canonical one.
//!
//! Renaming only happens within a bucket. Same-named sources with different
//! shapes in different buckets keep their names and are flagged as
//! duplicates by the shared pipeline.

use std::collections::HashSet;

use crate::comparator::Comparator;
use crate::types::{ApiGraph, SourceId};

use super::{group_by_name, sort_graph, UnificationState, UnificationStrategy};

/// Postfix unification, optionally consolidating shared sources into the
/// `share` bucket.
#[derive(Debug, Clone, Default)]
pub struct PostfixStrategy {
    share: Option<String>,
}

impl PostfixStrategy {
    pub fn new(share: Option<String>) -> Self {
        Self { share }
    }
}

impl UnificationStrategy for PostfixStrategy {
    fn process(&self, state: &mut UnificationState) {
        merge(state);
        sort_graph(&mut state.graph);

        for index in 0..state.graph.introspections.len() {
            dedupe_controllers(&mut state.graph, index);
            dedupe_equal_sources(state, index);
            rename_collisions(&mut state.graph, index);
        }

        consolidate(state, self.share.as_deref());
    }
}

/// Fold every per-origin bucket into one unified bucket per origin tag.
fn merge(state: &mut UnificationState) {
    let UnificationState { graph, originals } = state;

    for original in originals.iter_mut() {
        let controllers = std::mem::take(&mut original.controllers);
        let bucket = graph.introspection_or_insert(&original.origin, &original.origin);
        bucket.sources.extend(original.sources.iter().copied());
        bucket.controllers.extend(controllers);
    }
}

fn dedupe_controllers(graph: &mut ApiGraph, index: usize) {
    let introspection = &mut graph.introspections[index];

    let mut seen = HashSet::new();
    introspection.controllers.retain(|c| seen.insert(c.name.clone()));

    for controller in &mut introspection.controllers {
        let mut seen = HashSet::new();
        controller.methods.retain(|m| seen.insert(m.name.clone()));
    }
}

/// Collapse same-named sources with equal shapes, keeping the one the bucket's
/// own origin discovered when there is one.
fn dedupe_equal_sources(state: &mut UnificationState, index: usize) {
    let universe = state.universe();
    let graph = &mut state.graph;
    let bucket = graph.introspections[index].origin.clone();
    let groups = group_by_name(graph, &graph.introspections[index].sources);

    let mut comparator = Comparator::new();
    let mut removed: HashSet<SourceId> = HashSet::new();

    for group in groups.iter().filter(|g| g.len() > 1) {
        for (i, &a) in group.iter().enumerate() {
            for &b in &group[i + 1..] {
                if removed.contains(&a) || removed.contains(&b) {
                    continue;
                }
                if !comparator.is_equal(graph, a, b, &universe) {
                    continue;
                }

                let foreign_first = graph.source(a).added_from != bucket && graph.source(b).added_from == bucket;
                let (keep, drop) = if foreign_first { (b, a) } else { (a, b) };

                tracing::debug!(
                    "Dropping {} from {} in bucket {}, equal to the copy from {}",
                    graph.source(drop).name(),
                    graph.source(drop).added_from,
                    bucket,
                    graph.source(keep).added_from
                );
                graph.merge_usages(keep, drop);
                removed.insert(drop);
            }
        }
    }

    graph.introspections[index]
        .sources
        .retain(|s| !removed.contains(s));
}

/// Suffix same-named sources whose shapes differ with their discovering
/// origin, unless that origin owns the bucket.
fn rename_collisions(graph: &mut ApiGraph, index: usize) {
    let bucket = graph.introspections[index].origin.clone();
    let groups = group_by_name(graph, &graph.introspections[index].sources);

    for group in groups.into_iter().filter(|g| g.len() > 1) {
        for s in group {
            let source = graph.source(s);
            if source.added_from == bucket {
                continue;
            }

            let from = source.added_from.clone();
            let candidate = format!("{}__{}", source.name(), from);
            let mut name = candidate.clone();
            let mut attempt = 2;
            while graph.has_source_named(&bucket, &name) {
                name = format!("{candidate}{attempt}");
                attempt += 1;
            }

            tracing::debug!("Renaming {} of bucket {} to {}", source.name(), bucket, name);
            graph.rename_source(s, &name);
            graph.source_mut(s).shape.annotate(&format!("@From {from}"));
        }
    }
}

/// Consolidate equal same-named sources living in different buckets.
///
/// Within each name group, every source joins the first earlier source it is
/// equal to, or starts a class of its own. A class with more than one member
/// keeps its first member; when the whole group is a single class and a share
/// bucket is configured, the survivor moves there.
fn consolidate(state: &mut UnificationState, share: Option<&str>) {
    let universe = state.universe();
    let graph = &mut state.graph;
    let placed = graph.bucket_sources();
    let ids: Vec<SourceId> = placed.iter().map(|(_, s)| *s).collect();
    let bucket_of = |s: SourceId| {
        placed
            .iter()
            .find(|(_, p)| *p == s)
            .map(|(b, _)| b.clone())
            .unwrap_or_default()
    };

    let mut comparator = Comparator::new();

    for group in group_by_name(graph, &ids).into_iter().filter(|g| g.len() > 1) {
        let mut classes: Vec<(SourceId, Vec<SourceId>)> = Vec::new();
        for s in group {
            let joined = classes
                .iter_mut()
                .find(|class| comparator.is_equal(graph, class.0, s, &universe));
            match joined {
                Some((_, members)) => members.push(s),
                None => classes.push((s, Vec::new())),
            }
        }

        for (canonical, members) in &classes {
            let target = bucket_of(*canonical);
            for &member in members {
                let from = bucket_of(member);
                tracing::debug!(
                    "Consolidating {} of bucket {} into bucket {}",
                    graph.source(member).name(),
                    from,
                    target
                );
                graph.merge_usages(*canonical, member);
                if let Some(introspection) = graph.introspection_mut(&from) {
                    introspection.sources.retain(|&p| p != member);
                }
            }
        }

        let Some(share) = share else {
            continue;
        };
        if let [(canonical, members)] = classes.as_slice() {
            let current = bucket_of(*canonical);
            if members.is_empty() || current == share {
                continue;
            }
            if let Some(introspection) = graph.introspection_mut(&current) {
                introspection.sources.retain(|&p| p != *canonical);
            }
            graph.move_source(*canonical, share);
            graph.introspection_or_insert(share, share).sources.push(*canonical);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Controller, Field, Interface, Introspection, Method, RequestMethod, Shape, Source, Type, TypeId, TypeKind};

    fn interface(graph: &mut ApiGraph, origin: &str, from: &str, name: &str, field_kind: TypeKind) -> (SourceId, TypeId) {
        let field_ty = graph.add_type(Type::new(field_kind, "x", origin));
        let mut shape = Interface::new(name, "");
        shape.fields.push(Field {
            name: "value".into(),
            comment: String::new(),
            is_required: false,
            ty: field_ty,
        });
        let id = graph.add_source(Source {
            origin: origin.into(),
            added_from: from.into(),
            shape: Shape::Interface(shape),
            used_in: Vec::new(),
        });
        let usage = graph.add_type(Type::new(TypeKind::Entity, name, origin));
        graph.attach_usage(id, usage);
        (id, usage)
    }

    fn original(origin: &str, from: &str, sources: Vec<SourceId>) -> Introspection {
        Introspection {
            sources,
            ..Introspection::new(origin, from)
        }
    }

    fn controller(name: &str, methods: &[&str], graph: &mut ApiGraph) -> Controller {
        let methods = methods
            .iter()
            .map(|m| Method {
                name: m.to_string(),
                comment: String::new(),
                request: RequestMethod::Get,
                path: "/".into(),
                params: graph.add_type(Type::void("a")),
                query: graph.add_type(Type::void("a")),
                payload: Vec::new(),
                response: Vec::new(),
            })
            .collect();
        Controller {
            name: name.into(),
            base: "/".into(),
            comment: String::new(),
            origin: "a".into(),
            added_from: "a".into(),
            is_duplicate: false,
            methods,
            interplay: Vec::new(),
        }
    }

    #[test]
    fn test_equal_sources_collapse_with_usage_union() {
        let mut state = UnificationState::default();
        let (a, ua) = interface(&mut state.graph, "common", "a", "Money", TypeKind::Number);
        let (b, ub) = interface(&mut state.graph, "common", "b", "Money", TypeKind::Number);
        state.originals = vec![original("common", "a", vec![a]), original("common", "b", vec![b])];

        PostfixStrategy::default().process(&mut state);

        let common = state.graph.introspection("common").unwrap();
        assert_eq!(common.sources, vec![a]);
        assert_eq!(state.graph.source(a).used_in, vec![ua, ub]);
    }

    #[test]
    fn test_native_copy_survives() {
        let mut state = UnificationState::default();
        let (foreign, _) = interface(&mut state.graph, "b", "a", "Money", TypeKind::Number);
        let (native, _) = interface(&mut state.graph, "b", "b", "Money", TypeKind::Number);
        state.originals = vec![original("b", "a", vec![foreign]), original("b", "b", vec![native])];

        PostfixStrategy::default().process(&mut state);

        assert_eq!(state.graph.introspection("b").unwrap().sources, vec![native]);
    }

    #[test]
    fn test_different_shapes_get_suffix() {
        let mut state = UnificationState::default();
        let (a, _) = interface(&mut state.graph, "common", "a", "Money", TypeKind::Number);
        let (b, ub) = interface(&mut state.graph, "common", "b", "Money", TypeKind::String);
        state.originals = vec![original("common", "a", vec![a]), original("common", "b", vec![b])];

        PostfixStrategy::default().process(&mut state);

        assert_eq!(state.graph.source(a).name(), "Money__a");
        assert_eq!(state.graph.source(b).name(), "Money__b");
        assert_eq!(state.graph.ty(ub).name, "Money__b");
        assert!(state.graph.source(b).shape.comment().contains("@From b"));
    }

    #[test]
    fn test_cross_bucket_consolidation_into_share() {
        let mut state = UnificationState::default();
        let (a, ua) = interface(&mut state.graph, "a", "a", "Money", TypeKind::Number);
        let (b, ub) = interface(&mut state.graph, "b", "b", "Money", TypeKind::Number);
        state.originals = vec![original("a", "a", vec![a]), original("b", "b", vec![b])];

        PostfixStrategy::new(Some("shared".into())).process(&mut state);

        assert!(state.graph.introspection("a").unwrap().sources.is_empty());
        assert!(state.graph.introspection("b").unwrap().sources.is_empty());
        assert_eq!(state.graph.introspection("shared").unwrap().sources, vec![a]);
        assert_eq!(state.graph.ty(ua).origin, "shared");
        assert_eq!(state.graph.ty(ub).origin, "shared");
    }

    #[test]
    fn test_cross_bucket_consolidation_without_share() {
        let mut state = UnificationState::default();
        let (a, _) = interface(&mut state.graph, "a", "a", "Money", TypeKind::Number);
        let (b, ub) = interface(&mut state.graph, "b", "b", "Money", TypeKind::Number);
        state.originals = vec![original("a", "a", vec![a]), original("b", "b", vec![b])];

        PostfixStrategy::default().process(&mut state);

        assert_eq!(state.graph.introspection("a").unwrap().sources, vec![a]);
        assert!(state.graph.introspection("b").unwrap().sources.is_empty());
        assert_eq!(state.graph.ty(ub).origin, "a");
    }

    #[test]
    fn test_controllers_and_methods_deduped() {
        let mut state = UnificationState::default();
        let first = controller("User", &["get", "get", "save"], &mut state.graph);
        let second = controller("User", &["remove"], &mut state.graph);
        let mut bucket = original("a", "a", Vec::new());
        bucket.controllers = vec![first, second];
        state.originals = vec![bucket];

        PostfixStrategy::default().process(&mut state);

        let controllers = &state.graph.introspection("a").unwrap().controllers;
        assert_eq!(controllers.len(), 1);
        let names: Vec<&str> = controllers[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["get", "save"]);
    }
}
