//! Controllers and their endpoints.
//!
//! Each entry point becomes one [`Controller`]. Methods the adapters
//! recognise as REST endpoints become [`Method`]s; inherited methods are
//! pulled in from parent classes and interfaces with the parent's generic
//! variables bound to the child's arguments.

use std::collections::HashSet;

use crate::adapter::ArgumentContext;
use crate::entity::{Entity, MethodEntity, TypeEntity};
use crate::naming::upper_first;
use crate::type_graph::{Bindings, TypeGraphBuilder};
use crate::types::{
    AtlasResult, Controller, Field, Interface, Method, Shape, Source, SourceId, Type, TypeId, TypeKind,
};

/// A parsed endpoint with its synthesized request shapes.
struct Endpoint {
    method: Method,
    interplay: Vec<SourceId>,
}

/// Builds controllers on top of an origin's type graph.
pub struct ControllerBuilder<'b, 'a> {
    types: &'b mut TypeGraphBuilder<'a>,
    visited: HashSet<String>,
}

impl<'b, 'a> ControllerBuilder<'b, 'a> {
    pub fn new(types: &'b mut TypeGraphBuilder<'a>) -> Self {
        Self {
            types,
            visited: HashSet::new(),
        }
    }

    /// Build the controller for an entry point and add it to its bucket.
    pub fn build(mut self, entry: &'a Entity) -> AtlasResult<()> {
        let origin = self.types.origin();
        let adapters = self.types.adapters();
        let bucket = self.types.bucket_of(&entry.path);

        let mut name = adapters.get_entry_name(entry, origin);
        let taken = self
            .types
            .graph()
            .introspection(&bucket)
            .is_some_and(|i| i.controller(&name).is_some());
        if taken {
            name = format!("{}{}", entry.name, upper_first(origin));
        }

        let mut controller = Controller {
            name,
            base: adapters.get_base_path(entry),
            comment: self.types.comment_of(entry),
            origin: bucket.clone(),
            added_from: origin.to_string(),
            is_duplicate: false,
            methods: Vec::new(),
            interplay: Vec::new(),
        };

        self.visited.insert(entry.path.clone());
        self.collect(entry, &mut controller, &Bindings::new())?;

        tracing::debug!(
            "Controller {} of {} has {} methods",
            controller.name,
            bucket,
            controller.methods.len()
        );
        self.types
            .graph_mut()
            .introspection_or_insert(&bucket, origin)
            .controllers
            .push(controller);
        Ok(())
    }

    fn collect(&mut self, entity: &'a Entity, controller: &mut Controller, bindings: &Bindings) -> AtlasResult<()> {
        for method in &entity.methods {
            let Some(endpoint) = self.endpoint(method, controller, bindings)? else {
                continue;
            };
            // overloads share a name; the first one wins
            if controller.methods.iter().any(|m| m.name == endpoint.method.name) {
                continue;
            }
            controller.interplay.extend(endpoint.interplay);
            controller.methods.push(endpoint.method);
        }

        for parent in entity.parents() {
            self.collect_parent(parent, controller, bindings)?;
        }

        Ok(())
    }

    fn collect_parent(&mut self, parent: &TypeEntity, controller: &mut Controller, bindings: &Bindings) -> AtlasResult<()> {
        let Some(declared) = self.types.index().get(&parent.path) else {
            tracing::warn!("Cannot find parent \"{}\" of controller {}", parent.path, controller.name);
            return Ok(());
        };
        if !self.visited.insert(declared.path.clone()) {
            return Ok(());
        }

        let mut inherited = Bindings::new();
        for (variable, generic) in declared.sorted_variables().into_iter().zip(parent.sorted_generics()) {
            let bound = if generic.is_parameter {
                bindings.get(&generic.name).cloned().unwrap_or_else(|| generic.clone())
            } else {
                generic.clone()
            };
            inherited.insert(variable.name.clone(), bound);
        }

        self.collect(declared, controller, &inherited)
    }

    fn endpoint(&mut self, entity: &MethodEntity, controller: &Controller, bindings: &Bindings) -> AtlasResult<Option<Endpoint>> {
        let adapters = self.types.adapters();
        let Some(rest) = adapters.get_rest(entity) else {
            return Ok(None);
        };

        let origin = controller.origin.clone();
        let params = self.types.graph_mut().add_type(Type::void(&origin));
        let query = self.types.graph_mut().add_type(Type::void(&origin));

        let mut method = Method {
            name: entity.name.clone(),
            comment: self.types.comment_of(entity),
            request: rest.request,
            path: normalize_path(&format!("{}/{}", controller.base, rest.path)),
            params,
            query,
            payload: Vec::new(),
            response: Vec::new(),
        };

        for returned in adapters.get_method_returns(entity) {
            let ty = self.types.type_of(&returned, bindings)?;
            let graph = self.types.graph();
            if graph.ty(ty).kind == TypeKind::Void {
                continue;
            }
            if method.response.iter().any(|&r| graph.same_type(r, ty)) {
                continue;
            }
            method.response.push(ty);
        }

        let title = upper_first(&entity.name);
        let mut query_shape = Interface::new(format!("{title}Query"), "");
        let mut params_shape = Interface::new(format!("{title}Params"), "");
        let params_in_path = adapters.get_params_from_path(&method.path);
        let mut current_param = 0;

        for argument in &entity.arguments {
            let ty = self.types.type_of(&argument.ty, bindings)?;
            let comment = self.types.comment_of(argument);
            let ctx = ArgumentContext {
                argument,
                ty,
                comment: &comment,
                params_in_path: &params_in_path,
                current_param,
            };

            method.payload.extend(adapters.get_method_payload(&ctx));
            query_shape.fields.extend(adapters.get_query_fields(&ctx));

            let found = adapters.get_params_fields(&ctx);
            if !found.is_empty() {
                current_param += 1;
                params_shape.fields.extend(found);
            }
        }

        for placeholder in &params_in_path {
            if params_shape.has_field(placeholder) {
                continue;
            }
            let ty = self
                .types
                .graph_mut()
                .add_type(Type::new(TypeKind::String, "string", &origin));
            params_shape.fields.push(Field {
                name: placeholder.clone(),
                comment: String::new(),
                is_required: true,
                ty,
            });
        }

        if !adapters.has_params_in_path(&method.path) {
            if let Some(first) = params_shape.fields.first() {
                method.path = normalize_path(&format!("{}/{{{}}}", method.path, first.name));
            }
        }

        let mut interplay = Vec::new();
        if let Some((source, ty)) = self.synthesize(query_shape, &origin) {
            method.query = ty;
            interplay.push(source);
        }
        if let Some((source, ty)) = self.synthesize(params_shape, &origin) {
            method.params = ty;
            interplay.push(source);
        }

        Ok(Some(Endpoint { method, interplay }))
    }

    /// Register a controller-local request shape unless it is empty.
    fn synthesize(&mut self, shape: Interface, origin: &str) -> Option<(SourceId, TypeId)> {
        if shape.fields.is_empty() {
            return None;
        }

        let added_from = self.types.origin().to_string();
        let graph = self.types.graph_mut();
        let ty = graph.add_type(Type::new(TypeKind::Entity, &shape.name, origin));
        let source = graph.add_source(Source {
            origin: origin.to_string(),
            added_from,
            shape: Shape::Interface(shape),
            used_in: Vec::new(),
        });
        graph.attach_usage(source, ty);
        Some((source, ty))
    }
}

/// Collapse repeated slashes.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}
