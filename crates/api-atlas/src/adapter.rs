//! Extension points for framework-specific readings of entity descriptions.
//!
//! An [`Adapter`] overrides any subset of hooks. Each hook receives the
//! accumulated result of the adapters before it (`previous`) and returns a
//! new result; [`AdapterChain`] folds the hooks left to right starting from
//! a fixed seed.

use std::sync::Arc;

use crate::entity::{
    Annotated, ArgumentEntity, Description, Entity, FieldEntity, MethodEntity, TypeEntity,
};
use crate::types::{Field, Rest, TypeId, TypeKind};

/// Everything an argument hook knows about the argument being read.
#[derive(Debug, Clone, Copy)]
pub struct ArgumentContext<'a> {
    pub argument: &'a ArgumentEntity,
    /// Type site already built for the argument.
    pub ty: TypeId,
    pub comment: &'a str,
    /// Placeholders found in the method path, in order.
    pub params_in_path: &'a [String],
    /// Index of the next path placeholder not yet claimed by an argument.
    pub current_param: usize,
}

/// Framework-specific hooks. Every hook defaults to returning `previous`.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    fn query_entry_points<'a>(
        &self,
        _description: &'a Description,
        previous: Vec<&'a Entity>,
        _origin: &str,
    ) -> Vec<&'a Entity> {
        previous
    }

    fn load_additional_data<'a>(
        &self,
        _description: &'a Description,
        previous: Vec<&'a Entity>,
        _origin: &str,
    ) -> Vec<&'a Entity> {
        previous
    }

    fn is_required(&self, _member: &dyn Annotated, previous: bool) -> bool {
        previous
    }

    fn has_params_in_path(&self, _path: &str, previous: bool) -> bool {
        previous
    }

    fn get_params_from_path(&self, _path: &str, previous: Vec<String>) -> Vec<String> {
        previous
    }

    fn get_method_payload(&self, _ctx: &ArgumentContext<'_>, previous: Vec<TypeId>) -> Vec<TypeId> {
        previous
    }

    fn get_query_fields(&self, _ctx: &ArgumentContext<'_>, previous: Vec<Field>) -> Vec<Field> {
        previous
    }

    fn get_params_fields(&self, _ctx: &ArgumentContext<'_>, previous: Vec<Field>) -> Vec<Field> {
        previous
    }

    fn extract_name(&self, _field: &FieldEntity, previous: String) -> String {
        previous
    }

    fn extract_field_from_method(
        &self,
        _method: &MethodEntity,
        previous: Option<String>,
    ) -> Option<String> {
        previous
    }

    fn should_add_field(&self, _field: &FieldEntity, previous: bool) -> bool {
        previous
    }

    fn get_kind(&self, _entity: &TypeEntity, previous: TypeKind) -> TypeKind {
        previous
    }

    fn get_base_path(&self, _entry: &Entity, previous: String) -> String {
        previous
    }

    fn get_rest(&self, _method: &MethodEntity, previous: Option<Rest>) -> Option<Rest> {
        previous
    }

    fn get_method_returns(
        &self,
        _method: &MethodEntity,
        previous: Vec<TypeEntity>,
    ) -> Vec<TypeEntity> {
        previous
    }

    fn get_entry_name(&self, _entry: &Entity, previous: String, _origin: &str) -> String {
        previous
    }

    fn get_comment(&self, _subject: &dyn Annotated, previous: String) -> String {
        previous
    }
}

/// Language-neutral reading of a type name, used as the `get_kind` seed.
pub fn default_kind(entity: &TypeEntity) -> TypeKind {
    if entity.is_array {
        return TypeKind::List;
    }
    if entity.is_parameter {
        return TypeKind::TypeParameter;
    }

    match entity.name.to_ascii_lowercase().as_str() {
        "void" => TypeKind::Void,
        "string" | "char" | "character" => TypeKind::String,
        "number" | "int" | "integer" | "long" | "short" | "byte" | "float" | "double"
        | "bigdecimal" | "biginteger" => TypeKind::Number,
        "boolean" | "bool" => TypeKind::Boolean,
        "date" | "datetime" | "localdate" | "localdatetime" | "instant" => TypeKind::Date,
        "object" | "any" => TypeKind::Object,
        "list" | "set" | "collection" | "array" => TypeKind::List,
        "map" => TypeKind::Map,
        _ => TypeKind::Entity,
    }
}

/// Ordered set of adapters invoked as a left fold.
#[derive(Clone, Default)]
pub struct AdapterChain {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl std::fmt::Debug for AdapterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl AdapterChain {
    pub fn new(adapters: Vec<Arc<dyn Adapter>>) -> Self {
        Self { adapters }
    }

    pub fn push(&mut self, adapter: Arc<dyn Adapter>) {
        self.adapters.push(adapter);
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Entry points of a description, without duplicates.
    pub fn query_entry_points<'a>(&self, description: &'a Description, origin: &str) -> Vec<&'a Entity> {
        let found = self
            .adapters
            .iter()
            .fold(Vec::new(), |prev, a| a.query_entry_points(description, prev, origin));
        dedup_entities(found)
    }

    pub fn load_additional_data<'a>(&self, description: &'a Description, origin: &str) -> Vec<&'a Entity> {
        let found = self
            .adapters
            .iter()
            .fold(Vec::new(), |prev, a| a.load_additional_data(description, prev, origin));
        dedup_entities(found)
    }

    pub fn is_required(&self, member: &dyn Annotated) -> bool {
        self.adapters.iter().fold(false, |prev, a| a.is_required(member, prev))
    }

    pub fn has_params_in_path(&self, path: &str) -> bool {
        self.adapters.iter().fold(false, |prev, a| a.has_params_in_path(path, prev))
    }

    pub fn get_params_from_path(&self, path: &str) -> Vec<String> {
        self.adapters
            .iter()
            .fold(Vec::new(), |prev, a| a.get_params_from_path(path, prev))
    }

    pub fn get_method_payload(&self, ctx: &ArgumentContext<'_>) -> Vec<TypeId> {
        self.adapters
            .iter()
            .fold(Vec::new(), |prev, a| a.get_method_payload(ctx, prev))
    }

    pub fn get_query_fields(&self, ctx: &ArgumentContext<'_>) -> Vec<Field> {
        self.adapters
            .iter()
            .fold(Vec::new(), |prev, a| a.get_query_fields(ctx, prev))
    }

    pub fn get_params_fields(&self, ctx: &ArgumentContext<'_>) -> Vec<Field> {
        self.adapters
            .iter()
            .fold(Vec::new(), |prev, a| a.get_params_fields(ctx, prev))
    }

    pub fn extract_name(&self, field: &FieldEntity) -> String {
        self.adapters
            .iter()
            .fold(field.name.trim().to_string(), |prev, a| a.extract_name(field, prev))
    }

    pub fn extract_field_from_method(&self, method: &MethodEntity) -> Option<String> {
        self.adapters
            .iter()
            .fold(None, |prev, a| a.extract_field_from_method(method, prev))
    }

    pub fn should_add_field(&self, field: &FieldEntity) -> bool {
        self.adapters.iter().fold(true, |prev, a| a.should_add_field(field, prev))
    }

    pub fn get_kind(&self, entity: &TypeEntity) -> TypeKind {
        self.adapters
            .iter()
            .fold(default_kind(entity), |prev, a| a.get_kind(entity, prev))
    }

    pub fn get_base_path(&self, entry: &Entity) -> String {
        self.adapters
            .iter()
            .fold(String::new(), |prev, a| a.get_base_path(entry, prev))
    }

    pub fn get_rest(&self, method: &MethodEntity) -> Option<Rest> {
        self.adapters.iter().fold(None, |prev, a| a.get_rest(method, prev))
    }

    pub fn get_method_returns(&self, method: &MethodEntity) -> Vec<TypeEntity> {
        self.adapters
            .iter()
            .fold(vec![method.returns.clone()], |prev, a| a.get_method_returns(method, prev))
    }

    pub fn get_entry_name(&self, entry: &Entity, origin: &str) -> String {
        let name = self
            .adapters
            .iter()
            .fold(entry.name.clone(), |prev, a| a.get_entry_name(entry, prev, origin));
        if name.is_empty() {
            entry.name.clone()
        } else {
            name
        }
    }

    pub fn get_comment(&self, subject: &dyn Annotated) -> String {
        self.adapters
            .iter()
            .fold(subject.comment().to_string(), |prev, a| a.get_comment(subject, prev))
    }
}

fn dedup_entities(entities: Vec<&Entity>) -> Vec<&Entity> {
    let mut out: Vec<&Entity> = Vec::with_capacity(entities.len());
    for e in entities {
        if !out.iter().any(|o| std::ptr::eq(*o, e)) {
            out.push(e);
        }
    }
    out
}
