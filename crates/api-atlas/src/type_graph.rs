//! Turns entity type references into type sites and sources.
//!
//! Sources are registered under their entity path before their members are
//! built, so a type that refers back to itself (directly or through other
//! types) finds the in-progress source instead of recursing forever.

use std::collections::HashMap;

use crate::adapter::AdapterChain;
use crate::comment;
use crate::comparator::Comparator;
use crate::entity::{Annotated, Entity, EntityIndex, EntityKind, GenericEntity, TypeEntity};
use crate::naming::NamingResolver;
use crate::origin::BucketRules;
use crate::types::{
    ApiGraph, AtlasError, AtlasResult, EnumValue, Enumeration, Field, Interface, Shape, Source,
    SourceId, Type, TypeId, TypeKind,
};

/// Generic variable name → the argument bound to it.
pub type Bindings = HashMap<String, GenericEntity>;

/// Builds the type graph of one origin.
pub struct TypeGraphBuilder<'a> {
    origin: &'a str,
    index: &'a EntityIndex<'a>,
    adapters: &'a AdapterChain,
    buckets: &'a BucketRules,
    graph: ApiGraph,
    registry: HashMap<String, SourceId>,
}

impl<'a> TypeGraphBuilder<'a> {
    pub fn new(
        origin: &'a str,
        index: &'a EntityIndex<'a>,
        adapters: &'a AdapterChain,
        buckets: &'a BucketRules,
    ) -> Self {
        Self {
            origin,
            index,
            adapters,
            buckets,
            graph: ApiGraph::new(),
            registry: HashMap::new(),
        }
    }

    pub fn origin(&self) -> &'a str {
        self.origin
    }

    pub fn index(&self) -> &'a EntityIndex<'a> {
        self.index
    }

    pub fn adapters(&self) -> &'a AdapterChain {
        self.adapters
    }

    pub fn graph(&self) -> &ApiGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ApiGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> ApiGraph {
        self.graph
    }

    /// Bucket an entity path belongs to.
    pub fn bucket_of(&self, path: &str) -> String {
        self.buckets.resolve(path, self.origin)
    }

    /// Adapter-resolved, normalised comment of anything annotated.
    pub fn comment_of(&self, subject: &dyn Annotated) -> String {
        comment::normalize(&self.adapters.get_comment(subject))
    }

    /// Build the type site for a reference, loading its declaration when
    /// it names an entity.
    pub fn type_of(&mut self, entity: &TypeEntity, bindings: &Bindings) -> AtlasResult<TypeId> {
        if entity.is_parameter {
            if let Some(bound) = bindings.get(&entity.name) {
                return self.bound_type(bound);
            }
        }

        let origin = self.bucket_of(&entity.path);
        let kind = self.adapters.get_kind(entity);

        let mut generics = Vec::new();
        for generic in entity.sorted_generics() {
            generics.push(self.generic_of(generic, bindings, &origin)?);
        }

        let mut ty = Type::new(kind, &entity.name, origin);
        ty.generics = generics;
        let id = self.graph.add_type(ty);

        if kind == TypeKind::Entity {
            self.load(id, entity)?;
        }

        Ok(id)
    }

    /// Register an entity as a source without a referencing type site.
    pub fn register_entity(&mut self, entity: &Entity) -> AtlasResult<Option<SourceId>> {
        let id = self.type_of(&entity.as_type(), &Bindings::new())?;
        Ok(self.graph.resolve(id))
    }

    fn bound_type(&mut self, bound: &GenericEntity) -> AtlasResult<TypeId> {
        if bound.wildcard {
            return Ok(self.graph.add_type(Type::new(TypeKind::Object, &bound.name, self.origin)));
        }
        match &bound.ty {
            // Bound arguments are already expressed in the caller's terms.
            Some(ty) => self.type_of(ty, &Bindings::new()),
            None => Ok(self
                .graph
                .add_type(Type::new(TypeKind::TypeParameter, &bound.name, self.origin))),
        }
    }

    fn generic_of(&mut self, generic: &GenericEntity, bindings: &Bindings, origin: &str) -> AtlasResult<TypeId> {
        if generic.is_parameter {
            if let Some(bound) = bindings.get(&generic.name) {
                return self.bound_type(bound);
            }
            return Ok(self
                .graph
                .add_type(Type::new(TypeKind::TypeParameter, &generic.name, origin)));
        }

        if generic.wildcard {
            return Ok(self.graph.add_type(Type::new(TypeKind::Object, &generic.name, origin)));
        }

        match &generic.ty {
            Some(ty) => self.type_of(ty, bindings),
            None => Ok(self.graph.add_type(Type::new(TypeKind::Object, &generic.name, origin))),
        }
    }

    fn load(&mut self, ty: TypeId, entity: &TypeEntity) -> AtlasResult<()> {
        let Some(declared) = self.index.get(&entity.path) else {
            tracing::warn!("Cannot find \"{}\" in origin {}", entity.path, self.origin);
            return Ok(());
        };

        let Some(source) = self.register(declared, ty)? else {
            return Ok(());
        };

        let variables = match &self.graph.source(source).shape {
            Shape::Enumeration(_) => None,
            Shape::Interface(i) => Some(i.variables.clone()),
        };
        let Some(variables) = variables else {
            self.graph.ty_mut(ty).kind = TypeKind::Enumeration;
            return Ok(());
        };

        if self.graph.ty(ty).generics.is_empty() && !variables.is_empty() {
            let origin = self.graph.ty(ty).origin.clone();
            let placeholders: Vec<TypeId> = variables
                .iter()
                .map(|v| self.graph.add_type(Type::new(TypeKind::Void, v, &origin)))
                .collect();
            self.graph.ty_mut(ty).generics = placeholders;
        }

        Ok(())
    }

    /// Find or create the source for a declaration and attach `ty` to it.
    fn register(&mut self, declared: &'a Entity, ty: TypeId) -> AtlasResult<Option<SourceId>> {
        if declared.name.is_empty() {
            return Ok(None);
        }

        if let Some(&existing) = self.registry.get(&declared.path) {
            self.graph.attach_usage(existing, ty);
            return Ok(Some(existing));
        }

        let kind = declared.entity_kind();
        if kind == EntityKind::Other {
            return Err(AtlasError::UnknownEntityKind {
                path: declared.path.clone(),
                kind: declared.kind.clone(),
            });
        }

        let bucket = self.bucket_of(&declared.path);
        let name = NamingResolver::unique_name(&declared.name, &declared.path, |n| {
            self.graph.has_source_named(&bucket, n)
        });
        let comment = self.comment_of(declared);

        let shape = match kind {
            EntityKind::Enum => Shape::Enumeration(Enumeration {
                name: name.clone(),
                comment,
                is_duplicate: false,
                values: enum_values(declared),
            }),
            _ => Shape::Interface(Interface::new(&name, comment)),
        };

        let id = self.graph.add_source(Source {
            origin: bucket.clone(),
            added_from: self.origin.to_string(),
            shape,
            used_in: Vec::new(),
        });
        self.graph.attach_usage(id, ty);
        self.graph
            .introspection_or_insert(&bucket, self.origin)
            .sources
            .push(id);
        self.registry.insert(declared.path.clone(), id);

        if kind != EntityKind::Enum {
            self.build_interface(id, declared)?;
        }

        if name != declared.name {
            return Ok(Some(self.fold_into_existing(id, &bucket, &declared.name, &declared.path)));
        }

        Ok(Some(id))
    }

    /// A renamed source whose shape equals the natural-named one already in
    /// the bucket is dropped in favour of it.
    fn fold_into_existing(&mut self, id: SourceId, bucket: &str, natural: &str, path: &str) -> SourceId {
        let Some(existing) = self.graph.source_by_name(bucket, natural) else {
            return id;
        };

        let universe = self
            .graph
            .introspection(bucket)
            .map(|i| i.sources.clone())
            .unwrap_or_default();

        // The copy's own self-references carry its unique name; compare them
        // under the natural one.
        let unique = self.graph.source(id).name().to_string();
        self.graph.rename_source(id, natural);
        if !Comparator::new().is_equal(&self.graph, existing, id, &universe) {
            self.graph.rename_source(id, &unique);
            return id;
        }

        tracing::debug!("Merging {} into existing {} of bucket {}", path, natural, bucket);
        self.graph.merge_usages(existing, id);
        if let Some(introspection) = self.graph.introspection_mut(bucket) {
            introspection.sources.retain(|&s| s != id);
        }
        self.registry.insert(path.to_string(), existing);
        existing
    }

    fn build_interface(&mut self, id: SourceId, declared: &'a Entity) -> AtlasResult<()> {
        let bindings = Bindings::new();

        let variables: Vec<String> = declared.sorted_variables().iter().map(|v| v.name.clone()).collect();
        self.with_interface(id, |i| i.variables = variables);

        for parent in &declared.extends {
            let ty = self.type_of(parent, &bindings)?;
            if self.graph.ty(ty).kind == TypeKind::Entity {
                self.with_interface(id, |i| i.extends.push(ty));
            }
        }

        for method in &declared.methods {
            let Some(name) = self.adapters.extract_field_from_method(method) else {
                continue;
            };
            if name.is_empty() || self.has_field(id, &name) {
                continue;
            }

            let ty = self.type_of(&method.returns, &bindings)?;
            let field = Field {
                name,
                comment: self.comment_of(method),
                is_required: self.adapters.is_required(method),
                ty,
            };
            self.with_interface(id, |i| i.fields.push(field));
        }

        if declared.entity_kind() != EntityKind::Class {
            return Ok(());
        }

        for member in &declared.fields {
            if !self.adapters.should_add_field(member) {
                continue;
            }
            let name = self.adapters.extract_name(member);
            if name.is_empty() || self.has_field(id, &name) {
                continue;
            }

            let ty = self.type_of(&member.ty, &bindings)?;
            let field = Field {
                name,
                comment: self.comment_of(member),
                is_required: self.adapters.is_required(member),
                ty,
            };
            self.with_interface(id, |i| i.fields.push(field));
        }

        Ok(())
    }

    fn has_field(&self, id: SourceId, name: &str) -> bool {
        match &self.graph.source(id).shape {
            Shape::Interface(i) => i.has_field(name),
            Shape::Enumeration(_) => false,
        }
    }

    fn with_interface(&mut self, id: SourceId, f: impl FnOnce(&mut Interface)) {
        if let Shape::Interface(i) = &mut self.graph.source_mut(id).shape {
            f(i);
        }
    }
}

fn enum_values(declared: &Entity) -> Vec<EnumValue> {
    declared
        .item_names()
        .into_iter()
        .map(|item| {
            let key = if item.parse::<f64>().is_ok() {
                format!("E{item}")
            } else {
                item.clone()
            };
            EnumValue { key, value: item }
        })
        .collect()
}
