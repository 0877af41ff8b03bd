//! Keep one origin's view of each bucket.

use crate::types::{ApiGraph, Introspection};

use super::{group_by_name, UnificationState, UnificationStrategy};

/// For every bucket, keep the view produced by the origin that owns it, or
/// the first view seen when no origin owns it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnlyOriginStrategy;

impl UnificationStrategy for OnlyOriginStrategy {
    fn process(&self, state: &mut UnificationState) {
        let UnificationState { graph, originals } = state;

        for original in originals.iter_mut() {
            let owned = original.added_from == original.origin;
            let position = graph
                .introspections
                .iter()
                .position(|i| i.origin == original.origin);

            if position.is_some() && !owned {
                continue;
            }

            let introspection = Introspection {
                origin: original.origin.clone(),
                added_from: original.added_from.clone(),
                sources: original.sources.clone(),
                controllers: std::mem::take(&mut original.controllers),
            };
            match position {
                Some(index) => graph.introspections[index] = introspection,
                None => graph.introspections.push(introspection),
            }
        }

        for index in 0..graph.introspections.len() {
            suffix_collisions(graph, index);
        }
    }
}

/// Number same-named sources of one bucket after the first: `Foo`, `Foo2`,
/// `Foo3`.
fn suffix_collisions(graph: &mut ApiGraph, index: usize) {
    let bucket = graph.introspections[index].origin.clone();
    let groups = group_by_name(graph, &graph.introspections[index].sources);

    for group in groups.into_iter().filter(|g| g.len() > 1) {
        let base = graph.source(group[0]).name().to_string();
        let mut next = 2;
        for &s in &group[1..] {
            let mut name = format!("{base}{next}");
            while graph.has_source_named(&bucket, &name) {
                next += 1;
                name = format!("{base}{next}");
            }
            next += 1;
            graph.rename_source(s, &name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Interface, Shape, Source, SourceId};

    fn add(graph: &mut ApiGraph, origin: &str, from: &str, name: &str) -> SourceId {
        graph.add_source(Source {
            origin: origin.into(),
            added_from: from.into(),
            shape: Shape::Interface(Interface::new(name, "")),
            used_in: Vec::new(),
        })
    }

    fn original(origin: &str, from: &str, sources: Vec<SourceId>) -> Introspection {
        Introspection {
            sources,
            ..Introspection::new(origin, from)
        }
    }

    #[test]
    fn test_owner_view_wins() {
        let mut state = UnificationState::default();
        let from_a = add(&mut state.graph, "common", "a", "Money");
        let from_common = add(&mut state.graph, "common", "common", "Currency");
        state.originals = vec![
            original("common", "a", vec![from_a]),
            original("common", "common", vec![from_common]),
        ];

        OnlyOriginStrategy.process(&mut state);

        let common = state.graph.introspection("common").unwrap();
        assert_eq!(common.added_from, "common");
        assert_eq!(common.sources, vec![from_common]);
    }

    #[test]
    fn test_first_view_kept_without_owner() {
        let mut state = UnificationState::default();
        let from_a = add(&mut state.graph, "common", "a", "Money");
        let from_b = add(&mut state.graph, "common", "b", "Money");
        state.originals = vec![
            original("common", "a", vec![from_a]),
            original("common", "b", vec![from_b]),
        ];

        OnlyOriginStrategy.process(&mut state);

        let common = state.graph.introspection("common").unwrap();
        assert_eq!(common.added_from, "a");
        assert_eq!(common.sources, vec![from_a]);
    }

    #[test]
    fn test_numeric_suffixes() {
        let mut graph = ApiGraph::new();
        let ids: Vec<SourceId> = (0..3).map(|_| add(&mut graph, "a", "a", "Item")).collect();
        let taken = add(&mut graph, "a", "a", "Item2");
        graph.introspection_or_insert("a", "a").sources = vec![ids[0], ids[1], taken, ids[2]];

        suffix_collisions(&mut graph, 0);

        assert_eq!(graph.source(ids[0]).name(), "Item");
        assert_eq!(graph.source(ids[1]).name(), "Item3");
        assert_eq!(graph.source(ids[2]).name(), "Item4");
    }
}
