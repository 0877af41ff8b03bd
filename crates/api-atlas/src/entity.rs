//! Entity descriptions produced by the upstream source analyser.
//!
//! The analyser emits PascalCase JSON. Every key is optional; missing keys
//! fall back to empty values so partially described code still loads.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level description of one origin's code base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Description {
    pub modules: BTreeMap<String, Module>,
}

impl Description {
    /// Every exported entity, depth first, in module order.
    pub fn entities(&self) -> Vec<&Entity> {
        let mut out = Vec::new();
        for module in self.modules.values() {
            module.collect(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Module {
    pub exports: BTreeMap<String, Entity>,
    pub modules: BTreeMap<String, Module>,
}

impl Module {
    fn collect<'a>(&'a self, out: &mut Vec<&'a Entity>) {
        out.extend(self.exports.values());
        for module in self.modules.values() {
            module.collect(out);
        }
    }
}

/// Declared kind of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Class,
    Interface,
    Enum,
    Other,
}

/// A class, interface, or enum declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Entity {
    pub kind: String,
    pub name: String,
    pub path: String,
    pub comment: String,
    pub annotations: BTreeMap<String, Annotation>,
    pub modifiers: Vec<String>,
    pub variables: Vec<Variable>,
    pub extends: Vec<TypeEntity>,
    pub implements: Vec<TypeEntity>,
    pub fields: Vec<FieldEntity>,
    pub methods: Vec<MethodEntity>,
    pub items: Vec<Value>,
}

impl Entity {
    pub fn entity_kind(&self) -> EntityKind {
        match self.kind.to_ascii_lowercase().as_str() {
            "class" => EntityKind::Class,
            "interface" => EntityKind::Interface,
            "enum" => EntityKind::Enum,
            _ => EntityKind::Other,
        }
    }

    /// Generic variables ordered by position.
    pub fn sorted_variables(&self) -> Vec<&Variable> {
        let mut vars: Vec<&Variable> = self.variables.iter().collect();
        vars.sort_by_key(|v| v.position);
        vars
    }

    /// Parent types: the `extends` list followed by `implements`.
    pub fn parents(&self) -> impl Iterator<Item = &TypeEntity> {
        self.extends.iter().chain(self.implements.iter())
    }

    /// Enum items rendered as strings.
    pub fn item_names(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect()
    }

    /// A synthetic type reference pointing at this entity.
    pub fn as_type(&self) -> TypeEntity {
        TypeEntity {
            name: self.name.clone(),
            path: self.path.clone(),
            ..TypeEntity::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Variable {
    pub name: String,
    pub position: usize,
}

/// A reference to a type at a usage site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TypeEntity {
    pub name: String,
    pub path: String,
    pub is_parameter: bool,
    pub is_array: bool,
    pub generics: Vec<GenericEntity>,
}

impl TypeEntity {
    /// Generic arguments ordered by position.
    pub fn sorted_generics(&self) -> Vec<&GenericEntity> {
        let mut generics: Vec<&GenericEntity> = self.generics.iter().collect();
        generics.sort_by_key(|g| g.position);
        generics
    }
}

/// One generic argument of a [`TypeEntity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GenericEntity {
    pub name: String,
    pub position: usize,
    pub is_parameter: bool,
    pub wildcard: bool,
    #[serde(rename = "Type")]
    pub ty: Option<TypeEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FieldEntity {
    pub name: String,
    pub comment: String,
    pub annotations: BTreeMap<String, Annotation>,
    pub modifiers: Vec<String>,
    #[serde(rename = "Type")]
    pub ty: TypeEntity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MethodEntity {
    pub name: String,
    pub comment: String,
    pub annotations: BTreeMap<String, Annotation>,
    pub modifiers: Vec<String>,
    pub returns: TypeEntity,
    pub arguments: Vec<ArgumentEntity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ArgumentEntity {
    pub name: String,
    pub comment: String,
    pub annotations: BTreeMap<String, Annotation>,
    #[serde(rename = "Type")]
    pub ty: TypeEntity,
}

/// An annotation with its named items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Annotation {
    pub items: BTreeMap<String, AnnotationItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AnnotationItem {
    pub content: Value,
    #[serde(rename = "Type")]
    pub ty: Option<TypeEntity>,
}

impl Annotation {
    /// Text of an item: a string, or the first string of an array.
    pub fn text(&self, key: &str) -> Option<String> {
        let text = match &self.items.get(key)?.content {
            Value::String(s) => s.clone(),
            Value::Array(values) => values.iter().find_map(Value::as_str)?.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(text)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match &self.items.get(key)?.content {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Type payload of an item, e.g. `response = Foo.class`.
    pub fn ty(&self, key: &str) -> Option<&TypeEntity> {
        self.items.get(key)?.ty.as_ref()
    }
}

/// Anything that carries a comment and annotations.
pub trait Annotated {
    fn comment(&self) -> &str;
    fn annotations(&self) -> &BTreeMap<String, Annotation>;

    fn annotation(&self, name: &str) -> Option<&Annotation> {
        self.annotations().get(name)
    }

    fn has_annotation(&self, name: &str) -> bool {
        self.annotations().contains_key(name)
    }
}

macro_rules! annotated {
    ($($ty:ty),*) => {
        $(impl Annotated for $ty {
            fn comment(&self) -> &str {
                &self.comment
            }

            fn annotations(&self) -> &BTreeMap<String, Annotation> {
                &self.annotations
            }
        })*
    };
}

annotated!(Entity, FieldEntity, MethodEntity, ArgumentEntity);

/// Whether a modifier list marks a member public.
pub fn is_public(modifiers: &[String]) -> bool {
    modifiers.iter().any(|m| m.eq_ignore_ascii_case("public"))
}

/// Flat path → entity lookup over a [`Description`].
#[derive(Debug, Default)]
pub struct EntityIndex<'a> {
    paths: HashMap<&'a str, &'a Entity>,
}

impl<'a> EntityIndex<'a> {
    pub fn new(description: &'a Description) -> Self {
        let paths = description
            .entities()
            .into_iter()
            .filter(|e| !e.path.is_empty())
            .map(|e| (e.path.as_str(), e))
            .collect();
        Self { paths }
    }

    pub fn get(&self, path: &str) -> Option<&'a Entity> {
        self.paths.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
