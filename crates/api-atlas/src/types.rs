//! Core data types for the unified API graph.
//!
//! Types and sources live in flat arenas owned by [`ApiGraph`] and are
//! addressed by [`TypeId`] / [`SourceId`]. A source keeps the ids of every
//! type site that resolves to it (`used_in`), so renaming or moving a source
//! is a walk over that list instead of a graph traversal.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Index of a type site in [`ApiGraph::types`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub usize);

/// Index of a source in [`ApiGraph::sources`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub usize);

/// What a type site refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Entity,
    Enumeration,
    Object,
    List,
    Map,
    Void,
    Number,
    String,
    Boolean,
    Date,
    TypeParameter,
}

impl TypeKind {
    /// Kinds that point at a named [`Source`].
    pub fn is_named(self) -> bool {
        matches!(self, TypeKind::Entity | TypeKind::Enumeration)
    }
}

/// A usage-site reference to a shape or primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Type {
    pub kind: TypeKind,
    pub name: String,
    pub origin: String,
    pub generics: Vec<TypeId>,
    pub is_duplicate: bool,
}

impl Type {
    pub fn new(kind: TypeKind, name: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            origin: origin.into(),
            generics: Vec::new(),
            is_duplicate: false,
        }
    }

    pub fn void(origin: impl Into<String>) -> Self {
        Self::new(TypeKind::Void, "void", origin)
    }

    fn rebase(&mut self, offset: usize) {
        for g in &mut self.generics {
            g.0 += offset;
        }
    }
}

/// A member of an interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub comment: String,
    pub is_required: bool,
    #[serde(rename = "type")]
    pub ty: TypeId,
}

/// One `{key, value}` pair of an enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumValue {
    pub key: String,
    pub value: String,
}

/// A DTO-like shape: fields, parents, and generic parameter names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    pub comment: String,
    pub is_duplicate: bool,
    pub variables: Vec<String>,
    pub extends: Vec<TypeId>,
    pub fields: Vec<Field>,
}

impl Interface {
    pub fn new(name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: comment.into(),
            is_duplicate: false,
            variables: Vec::new(),
            extends: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enumeration {
    pub name: String,
    pub comment: String,
    pub is_duplicate: bool,
    pub values: Vec<EnumValue>,
}

/// The structural body of a [`Source`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Shape {
    Interface(Interface),
    Enumeration(Enumeration),
}

impl Shape {
    pub fn name(&self) -> &str {
        match self {
            Shape::Interface(i) => &i.name,
            Shape::Enumeration(e) => &e.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        match self {
            Shape::Interface(i) => i.name = name.into(),
            Shape::Enumeration(e) => e.name = name.into(),
        }
    }

    pub fn comment(&self) -> &str {
        match self {
            Shape::Interface(i) => &i.comment,
            Shape::Enumeration(e) => &e.comment,
        }
    }

    /// Append a line to the comment unless that exact line is already present.
    pub fn annotate(&mut self, line: &str) {
        let comment = match self {
            Shape::Interface(i) => &mut i.comment,
            Shape::Enumeration(e) => &mut e.comment,
        };

        if comment.lines().any(|l| l.trim() == line) {
            return;
        }

        if comment.is_empty() {
            *comment = line.to_string();
        } else {
            comment.push('\n');
            comment.push_str(line);
        }
    }

    pub fn is_duplicate(&self) -> bool {
        match self {
            Shape::Interface(i) => i.is_duplicate,
            Shape::Enumeration(e) => e.is_duplicate,
        }
    }

    pub fn set_duplicate(&mut self, value: bool) {
        match self {
            Shape::Interface(i) => i.is_duplicate = value,
            Shape::Enumeration(e) => e.is_duplicate = value,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Shape::Interface(_) => "Interface",
            Shape::Enumeration(_) => "Enumeration",
        }
    }

    /// Every type site directly owned by this shape (fields, then parents).
    pub fn type_sites(&self) -> Vec<TypeId> {
        match self {
            Shape::Interface(i) => i
                .fields
                .iter()
                .map(|f| f.ty)
                .chain(i.extends.iter().copied())
                .collect(),
            Shape::Enumeration(_) => Vec::new(),
        }
    }

    fn rebase(&mut self, offset: usize) {
        if let Shape::Interface(i) = self {
            for f in &mut i.fields {
                f.ty.0 += offset;
            }
            for e in &mut i.extends {
                e.0 += offset;
            }
        }
    }
}

/// A named shape plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Bucket the source currently lives in.
    pub origin: String,
    /// Origin whose parse discovered it.
    pub added_from: String,
    pub shape: Shape,
    pub used_in: Vec<TypeId>,
}

impl Source {
    pub fn name(&self) -> &str {
        self.shape.name()
    }

    fn rebase(&mut self, type_offset: usize) {
        self.shape.rebase(type_offset);
        for u in &mut self.used_in {
            u.0 += type_offset;
        }
    }
}

/// HTTP verbs understood by the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RequestMethod {
    /// Parse a verb case-insensitively.
    pub fn parse(verb: &str) -> Option<Self> {
        match verb.trim().to_ascii_lowercase().as_str() {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Verb and path of an endpoint as read from annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rest {
    pub request: RequestMethod,
    pub path: String,
}

/// One endpoint of a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub comment: String,
    pub request: RequestMethod,
    pub path: String,
    pub params: TypeId,
    pub query: TypeId,
    pub payload: Vec<TypeId>,
    pub response: Vec<TypeId>,
}

impl Method {
    /// Every type site owned by this method.
    pub fn type_sites(&self) -> Vec<TypeId> {
        let mut sites = vec![self.params, self.query];
        sites.extend(self.payload.iter().copied());
        sites.extend(self.response.iter().copied());
        sites
    }

    fn rebase(&mut self, offset: usize) {
        self.params.0 += offset;
        self.query.0 += offset;
        for p in &mut self.payload {
            p.0 += offset;
        }
        for r in &mut self.response {
            r.0 += offset;
        }
    }
}

/// A REST controller and the request shapes synthesized for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub name: String,
    pub base: String,
    pub comment: String,
    pub origin: String,
    pub added_from: String,
    pub is_duplicate: bool,
    pub methods: Vec<Method>,
    pub interplay: Vec<SourceId>,
}

impl Controller {
    fn rebase(&mut self, type_offset: usize, source_offset: usize) {
        for m in &mut self.methods {
            m.rebase(type_offset);
        }
        for s in &mut self.interplay {
            s.0 += source_offset;
        }
    }
}

/// Sources and controllers of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Introspection {
    pub origin: String,
    pub added_from: String,
    pub sources: Vec<SourceId>,
    pub controllers: Vec<Controller>,
}

impl Introspection {
    pub fn new(origin: impl Into<String>, added_from: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            added_from: added_from.into(),
            sources: Vec::new(),
            controllers: Vec::new(),
        }
    }

    pub fn controller(&self, name: &str) -> Option<&Controller> {
        self.controllers.iter().find(|c| c.name == name)
    }

    fn rebase(&mut self, type_offset: usize, source_offset: usize) {
        for s in &mut self.sources {
            s.0 += source_offset;
        }
        for c in &mut self.controllers {
            c.rebase(type_offset, source_offset);
        }
    }
}

/// Arena-backed container of every type site, source, and bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiGraph {
    pub types: Vec<Type>,
    pub sources: Vec<Source>,
    pub introspections: Vec<Introspection>,
}

impl ApiGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(&mut self, ty: Type) -> TypeId {
        self.types.push(ty);
        TypeId(self.types.len() - 1)
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.0]
    }

    pub fn ty_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.types[id.0]
    }

    pub fn add_source(&mut self, source: Source) -> SourceId {
        self.sources.push(source);
        SourceId(self.sources.len() - 1)
    }

    pub fn source(&self, id: SourceId) -> &Source {
        &self.sources[id.0]
    }

    pub fn source_mut(&mut self, id: SourceId) -> &mut Source {
        &mut self.sources[id.0]
    }

    /// Get the bucket for an origin tag.
    pub fn introspection(&self, origin: &str) -> Option<&Introspection> {
        self.introspections.iter().find(|i| i.origin == origin)
    }

    pub fn introspection_mut(&mut self, origin: &str) -> Option<&mut Introspection> {
        self.introspections.iter_mut().find(|i| i.origin == origin)
    }

    /// Get the bucket for an origin tag, creating it on first access.
    pub fn introspection_or_insert(&mut self, origin: &str, added_from: &str) -> &mut Introspection {
        let index = match self.introspections.iter().position(|i| i.origin == origin) {
            Some(index) => index,
            None => {
                self.introspections.push(Introspection::new(origin, added_from));
                self.introspections.len() - 1
            }
        };
        &mut self.introspections[index]
    }

    /// Source registered under `name` in bucket `origin`.
    pub fn source_by_name(&self, origin: &str, name: &str) -> Option<SourceId> {
        self.introspection(origin)?
            .sources
            .iter()
            .copied()
            .find(|&s| self.source(s).name() == name)
    }

    /// Whether `name` is taken by a source in bucket `origin`.
    pub fn has_source_named(&self, origin: &str, name: &str) -> bool {
        self.source_by_name(origin, name).is_some()
    }

    /// Resolve a named type site to its live source: a bucket source with
    /// the same name, or else the controller-local request shape it was
    /// synthesized for.
    pub fn resolve(&self, id: TypeId) -> Option<SourceId> {
        let ty = self.ty(id);
        if !ty.kind.is_named() {
            return None;
        }

        let introspection = self.introspection(&ty.origin)?;
        introspection
            .sources
            .iter()
            .copied()
            .find(|&s| self.source(s).name() == ty.name)
            .or_else(|| {
                introspection
                    .controllers
                    .iter()
                    .flat_map(|c| c.interplay.iter().copied())
                    .find(|&s| self.source(s).used_in.contains(&id))
            })
    }

    /// Record `ty` as a usage of `source` and point it at the source.
    pub fn attach_usage(&mut self, source: SourceId, ty: TypeId) {
        let (name, origin) = {
            let s = self.source(source);
            (s.name().to_string(), s.origin.clone())
        };

        let t = self.ty_mut(ty);
        t.name = name;
        t.origin = origin;

        let used_in = &mut self.source_mut(source).used_in;
        if !used_in.contains(&ty) {
            used_in.push(ty);
        }
    }

    /// Rename a source and every type site that resolves to it.
    pub fn rename_source(&mut self, id: SourceId, name: &str) {
        self.source_mut(id).shape.set_name(name);
        let used_in = self.source(id).used_in.clone();
        for t in used_in {
            self.ty_mut(t).name = name.to_string();
        }
    }

    /// Reparent a source and every type site that resolves to it. Bucket
    /// membership lists are the caller's concern.
    pub fn move_source(&mut self, id: SourceId, origin: &str) {
        self.source_mut(id).origin = origin.to_string();
        let used_in = self.source(id).used_in.clone();
        for t in used_in {
            self.ty_mut(t).origin = origin.to_string();
        }
    }

    /// Fold the usages of `from` into `into`, retargeting them by name and
    /// bucket. `from` keeps its record but no longer owns any usage.
    pub fn merge_usages(&mut self, into: SourceId, from: SourceId) {
        if into == from {
            return;
        }
        let moved = std::mem::take(&mut self.source_mut(from).used_in);
        for t in moved {
            self.attach_usage(into, t);
        }
    }

    /// Mark a source and all of its usages as a duplicate.
    pub fn flag_duplicate(&mut self, id: SourceId) {
        self.source_mut(id).shape.set_duplicate(true);
        let used_in = self.source(id).used_in.clone();
        for t in used_in {
            self.ty_mut(t).is_duplicate = true;
        }
    }

    /// Every `(bucket, source)` pair in bucket order.
    pub fn bucket_sources(&self) -> Vec<(String, SourceId)> {
        self.introspections
            .iter()
            .flat_map(|i| i.sources.iter().map(move |&s| (i.origin.clone(), s)))
            .collect()
    }

    /// Structural equality of two type sites, ignoring provenance.
    pub fn same_type(&self, a: TypeId, b: TypeId) -> bool {
        let (x, y) = (self.ty(a), self.ty(b));
        x.kind == y.kind
            && x.name == y.name
            && x.origin == y.origin
            && x.generics.len() == y.generics.len()
            && x
                .generics
                .iter()
                .zip(&y.generics)
                .all(|(&ga, &gb)| self.same_type(ga, gb))
    }

    /// Named type sites reachable from the buckets that do not resolve to a
    /// live source.
    pub fn dangling_references(&self) -> Vec<TypeId> {
        let mut roots: Vec<TypeId> = Vec::new();
        for introspection in &self.introspections {
            for &s in &introspection.sources {
                roots.extend(self.source(s).shape.type_sites());
            }
            for controller in &introspection.controllers {
                for method in &controller.methods {
                    roots.extend(method.type_sites());
                }
                for &s in &controller.interplay {
                    roots.extend(self.source(s).shape.type_sites());
                }
            }
        }

        let mut seen = HashSet::new();
        let mut dangling = Vec::new();
        while let Some(t) = roots.pop() {
            if !seen.insert(t) {
                continue;
            }
            let ty = self.ty(t);
            roots.extend(ty.generics.iter().copied());
            if ty.kind.is_named() && self.resolve(t).is_none() {
                dangling.push(t);
            }
        }
        dangling.sort();
        dangling
    }

    /// Move another graph's arenas into this one, rebasing every id. The
    /// other graph's buckets are returned rather than merged.
    pub fn absorb(&mut self, other: ApiGraph) -> Vec<Introspection> {
        let type_offset = self.types.len();
        let source_offset = self.sources.len();

        self.types.extend(other.types.into_iter().map(|mut t| {
            t.rebase(type_offset);
            t
        }));
        self.sources.extend(other.sources.into_iter().map(|mut s| {
            s.rebase(type_offset);
            s
        }));

        other
            .introspections
            .into_iter()
            .map(|mut i| {
                i.rebase(type_offset, source_offset);
                i
            })
            .collect()
    }
}

/// Errors that can occur while building the graph.
#[derive(thiserror::Error, Debug)]
pub enum AtlasError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to load origin {origin}: {reason}")]
    OriginLoad { origin: String, reason: String },

    #[error("Unknown kind \"{kind}\" of entity {path}")]
    UnknownEntityKind { path: String, kind: String },

    #[error("Origin task failed: {0}")]
    Task(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenience result type.
pub type AtlasResult<T> = Result<T, AtlasError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn source(graph: &mut ApiGraph, name: &str, origin: &str) -> SourceId {
        let id = graph.add_source(Source {
            origin: origin.to_string(),
            added_from: origin.to_string(),
            shape: Shape::Interface(Interface::new(name, "")),
            used_in: Vec::new(),
        });
        graph.introspection_or_insert(origin, origin).sources.push(id);
        id
    }

    #[test]
    fn test_rename_propagates_to_usages() {
        let mut graph = ApiGraph::new();
        let id = source(&mut graph, "User", "a");
        let t1 = graph.add_type(Type::new(TypeKind::Entity, "User", "a"));
        let t2 = graph.add_type(Type::new(TypeKind::Entity, "User", "a"));
        graph.attach_usage(id, t1);
        graph.attach_usage(id, t2);
        graph.attach_usage(id, t2);

        graph.rename_source(id, "User__a");

        assert_eq!(graph.source(id).used_in.len(), 2);
        assert_eq!(graph.ty(t1).name, "User__a");
        assert_eq!(graph.ty(t2).name, "User__a");
        assert_eq!(graph.resolve(t1), Some(id));
    }

    #[test]
    fn test_merge_usages_retargets_bucket() {
        let mut graph = ApiGraph::new();
        let keep = source(&mut graph, "Address", "a");
        let drop = source(&mut graph, "Address", "b");
        let ta = graph.add_type(Type::new(TypeKind::Entity, "Address", "a"));
        let tb = graph.add_type(Type::new(TypeKind::Entity, "Address", "b"));
        graph.attach_usage(keep, ta);
        graph.attach_usage(drop, tb);

        graph.merge_usages(keep, drop);

        assert_eq!(graph.source(keep).used_in, vec![ta, tb]);
        assert!(graph.source(drop).used_in.is_empty());
        assert_eq!(graph.ty(tb).origin, "a");
    }

    #[test]
    fn test_absorb_rebases_ids() {
        let mut first = ApiGraph::new();
        let a = source(&mut first, "A", "x");
        let ta = first.add_type(Type::new(TypeKind::Entity, "A", "x"));
        first.attach_usage(a, ta);

        let mut second = ApiGraph::new();
        let b = source(&mut second, "B", "y");
        let tb = second.add_type(Type::new(TypeKind::Entity, "B", "y"));
        second.attach_usage(b, tb);

        let mut combined = ApiGraph::new();
        let mut buckets = combined.absorb(first);
        buckets.extend(combined.absorb(second));

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[1].sources, vec![SourceId(1)]);
        assert_eq!(combined.source(SourceId(1)).used_in, vec![TypeId(1)]);
        assert_eq!(combined.ty(TypeId(1)).name, "B");
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let mut shape = Shape::Enumeration(Enumeration {
            name: "Color".into(),
            comment: String::new(),
            is_duplicate: false,
            values: Vec::new(),
        });
        shape.annotate("@addedFrom a");
        shape.annotate("@addedFrom a");
        assert_eq!(shape.comment(), "@addedFrom a");
    }

    #[test]
    fn test_request_method_parse() {
        assert_eq!(RequestMethod::parse("POST"), Some(RequestMethod::Post));
        assert_eq!(RequestMethod::parse("patch"), None);
    }
}
