//! Memoised structural equality of sources.
//!
//! Two sources are equal when their shapes match member for member and every
//! referenced named type resolves, within the comparison universe, to sources
//! that are themselves equal. Comments, source names, and type-site origins
//! are ignored.
//!
//! Cycles are cut by recording a provisional `true` for a pair before its
//! members are compared. Pairs decided `true` while that assumption is open
//! are journaled; if the assumed pair turns out unequal, those verdicts are
//! withdrawn along with it.

use std::collections::{HashMap, HashSet};

use crate::types::{ApiGraph, Interface, Shape, SourceId, TypeId};

/// Pairwise source comparator with a memo of already decided pairs.
#[derive(Debug, Default)]
pub struct Comparator {
    processed: HashMap<(SourceId, SourceId), bool>,
    /// Pairs recorded `true` since the outermost open comparison started.
    journal: Vec<(SourceId, SourceId)>,
    depth: usize,
}

fn pair(a: SourceId, b: SourceId) -> (SourceId, SourceId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Comparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoised pairs.
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    /// Compare two sources. Named types inside them are resolved against
    /// `universe`.
    pub fn is_equal(&mut self, graph: &ApiGraph, a: SourceId, b: SourceId, universe: &[SourceId]) -> bool {
        if a == b {
            return true;
        }

        let key = pair(a, b);
        if let Some(&decided) = self.processed.get(&key) {
            return decided;
        }

        let (sa, sb) = (graph.source(a), graph.source(b));
        if !surface_equal(graph, &sa.shape, &sb.shape) {
            self.processed.insert(key, false);
            return false;
        }

        let (Shape::Interface(ia), Shape::Interface(ib)) = (&sa.shape, &sb.shape) else {
            self.processed.insert(key, true);
            return true;
        };

        let mark = self.journal.len();
        self.processed.insert(key, true);
        self.journal.push(key);
        self.depth += 1;
        let deep = self.members_equal(graph, ia, &sa.added_from, ib, &sb.added_from, universe);
        self.depth -= 1;

        if !deep {
            // Everything decided since `mark` may have leaned on `key` being equal.
            for withdrawn in self.journal.drain(mark..) {
                self.processed.remove(&withdrawn);
            }
            self.processed.insert(key, false);
        }
        if self.depth == 0 {
            self.journal.clear();
        }
        deep
    }

    fn members_equal(
        &mut self,
        graph: &ApiGraph,
        a: &Interface,
        a_from: &str,
        b: &Interface,
        b_from: &str,
        universe: &[SourceId],
    ) -> bool {
        for field in &a.fields {
            let Some(other) = b.field(&field.name) else {
                return false;
            };
            if !self.types_equal(graph, field.ty, a_from, other.ty, b_from, universe) {
                return false;
            }
        }

        for &parent in &a.extends {
            let name = &graph.ty(parent).name;
            let Some(&other) = b.extends.iter().find(|&&e| &graph.ty(e).name == name) else {
                return false;
            };
            if !self.types_equal(graph, parent, a_from, other, b_from, universe) {
                return false;
            }
        }

        true
    }

    fn types_equal(
        &mut self,
        graph: &ApiGraph,
        a: TypeId,
        a_from: &str,
        b: TypeId,
        b_from: &str,
        universe: &[SourceId],
    ) -> bool {
        let (x, y) = (graph.ty(a), graph.ty(b));
        if !type_surface_equal(graph, a, b) {
            return false;
        }

        if x.kind.is_named() {
            let found_a = lookup(graph, universe, &x.name, &x.origin, a_from);
            let found_b = lookup(graph, universe, &y.name, &y.origin, b_from);
            match (found_a, found_b) {
                (Some(sa), Some(sb)) => {
                    if !self.is_equal(graph, sa, sb, universe) {
                        return false;
                    }
                }
                (None, None) => {}
                _ => return false,
            }
        }

        x.generics
            .iter()
            .zip(&y.generics)
            .all(|(&ga, &gb)| self.types_equal(graph, ga, a_from, gb, b_from, universe))
    }
}

/// Find the source a named type refers to, preferring one discovered by the
/// same origin as the referencing source.
fn lookup(graph: &ApiGraph, universe: &[SourceId], name: &str, origin: &str, added_from: &str) -> Option<SourceId> {
    let mut fallback = None;
    for &s in universe {
        let source = graph.source(s);
        if source.name() != name || source.origin != origin {
            continue;
        }
        if source.added_from == added_from {
            return Some(s);
        }
        fallback.get_or_insert(s);
    }
    fallback
}

fn type_surface_equal(graph: &ApiGraph, a: TypeId, b: TypeId) -> bool {
    let (x, y) = (graph.ty(a), graph.ty(b));
    x.kind == y.kind
        && x.name == y.name
        && x.generics.len() == y.generics.len()
        && x
            .generics
            .iter()
            .zip(&y.generics)
            .all(|(&ga, &gb)| type_surface_equal(graph, ga, gb))
}

/// Member-level equality that needs no recursion into other sources.
fn surface_equal(graph: &ApiGraph, a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::Interface(ia), Shape::Interface(ib)) => {
            if ia.variables != ib.variables
                || ia.fields.len() != ib.fields.len()
                || ia.extends.len() != ib.extends.len()
            {
                return false;
            }

            let names_a: HashSet<&str> = ia.fields.iter().map(|f| f.name.as_str()).collect();
            let names_b: HashSet<&str> = ib.fields.iter().map(|f| f.name.as_str()).collect();
            if names_a != names_b {
                return false;
            }

            let fields_match = ia.fields.iter().all(|fa| {
                ib.field(&fa.name).is_some_and(|fb| {
                    fa.is_required == fb.is_required && type_surface_equal(graph, fa.ty, fb.ty)
                })
            });

            let parents_a: HashSet<&str> = ia.extends.iter().map(|&e| graph.ty(e).name.as_str()).collect();
            let parents_b: HashSet<&str> = ib.extends.iter().map(|&e| graph.ty(e).name.as_str()).collect();

            fields_match && parents_a == parents_b
        }
        (Shape::Enumeration(ea), Shape::Enumeration(eb)) => {
            let values_a: HashSet<_> = ea.values.iter().collect();
            let values_b: HashSet<_> = eb.values.iter().collect();
            ea.values.len() == eb.values.len() && values_a == values_b
        }
        _ => false,
    }
}
