//! JSON document writer for the merged graph.
//!
//! The arenas are an in-memory convenience; the document inlines every type
//! site so a consumer never has to chase ids.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{
    ApiGraph, AtlasResult, Controller, EnumValue, Method, RequestMethod, Shape, SourceId, TypeId,
    TypeKind,
};

/// Self-contained view of an [`ApiGraph`], buckets in graph order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub buckets: Vec<BucketDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketDoc {
    pub origin: String,
    pub added_from: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controllers: Vec<ControllerDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDoc {
    pub kind: String,
    pub name: String,
    pub origin: String,
    pub added_from: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_duplicate: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<TypeDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDoc {
    pub kind: TypeKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generics: Vec<TypeDoc>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub is_required: bool,
    #[serde(rename = "type")]
    pub ty: TypeDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerDoc {
    pub name: String,
    pub base: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_duplicate: bool,
    pub methods: Vec<MethodDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interplay: Vec<SourceDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub request: RequestMethod,
    pub path: String,
    pub params: TypeDoc,
    pub query: TypeDoc,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<TypeDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response: Vec<TypeDoc>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Document {
    pub fn from_graph(graph: &ApiGraph) -> Self {
        let buckets = graph
            .introspections
            .iter()
            .map(|i| BucketDoc {
                origin: i.origin.clone(),
                added_from: i.added_from.clone(),
                sources: i.sources.iter().map(|&s| source_doc(graph, s)).collect(),
                controllers: i
                    .controllers
                    .iter()
                    .map(|c| controller_doc(graph, c))
                    .collect(),
            })
            .collect();

        Self { buckets }
    }

    pub fn bucket(&self, origin: &str) -> Option<&BucketDoc> {
        self.buckets.iter().find(|b| b.origin == origin)
    }

    pub fn source_count(&self) -> usize {
        self.buckets.iter().map(|b| b.sources.len()).sum()
    }

    pub fn controller_count(&self) -> usize {
        self.buckets.iter().map(|b| b.controllers.len()).sum()
    }

    pub fn method_count(&self) -> usize {
        self.buckets
            .iter()
            .flat_map(|b| &b.controllers)
            .map(|c| c.methods.len())
            .sum()
    }
}

fn type_doc(graph: &ApiGraph, id: TypeId) -> TypeDoc {
    let ty = graph.ty(id);
    TypeDoc {
        kind: ty.kind,
        name: ty.name.clone(),
        origin: if ty.kind.is_named() {
            ty.origin.clone()
        } else {
            String::new()
        },
        generics: ty.generics.iter().map(|&g| type_doc(graph, g)).collect(),
        is_duplicate: ty.is_duplicate,
    }
}

fn source_doc(graph: &ApiGraph, id: SourceId) -> SourceDoc {
    let source = graph.source(id);
    let mut doc = SourceDoc {
        kind: source.shape.kind_label().to_string(),
        name: source.name().to_string(),
        origin: source.origin.clone(),
        added_from: source.added_from.clone(),
        comment: source.shape.comment().to_string(),
        is_duplicate: source.shape.is_duplicate(),
        variables: Vec::new(),
        extends: Vec::new(),
        fields: Vec::new(),
        values: Vec::new(),
    };

    match &source.shape {
        Shape::Interface(i) => {
            doc.variables = i.variables.clone();
            doc.extends = i.extends.iter().map(|&t| type_doc(graph, t)).collect();
            doc.fields = i
                .fields
                .iter()
                .map(|f| FieldDoc {
                    name: f.name.clone(),
                    comment: f.comment.clone(),
                    is_required: f.is_required,
                    ty: type_doc(graph, f.ty),
                })
                .collect();
        }
        Shape::Enumeration(e) => doc.values = e.values.clone(),
    }

    doc
}

fn method_doc(graph: &ApiGraph, method: &Method) -> MethodDoc {
    MethodDoc {
        name: method.name.clone(),
        comment: method.comment.clone(),
        request: method.request,
        path: method.path.clone(),
        params: type_doc(graph, method.params),
        query: type_doc(graph, method.query),
        payload: method.payload.iter().map(|&t| type_doc(graph, t)).collect(),
        response: method.response.iter().map(|&t| type_doc(graph, t)).collect(),
    }
}

fn controller_doc(graph: &ApiGraph, controller: &Controller) -> ControllerDoc {
    ControllerDoc {
        name: controller.name.clone(),
        base: controller.base.clone(),
        comment: controller.comment.clone(),
        is_duplicate: controller.is_duplicate,
        methods: controller
            .methods
            .iter()
            .map(|m| method_doc(graph, m))
            .collect(),
        interplay: controller
            .interplay
            .iter()
            .map(|&s| source_doc(graph, s))
            .collect(),
    }
}

/// Writer for merged-graph documents.
pub struct DocumentWriter;

impl DocumentWriter {
    /// Write the graph's document to a file, creating parent directories.
    pub fn write_to_file(graph: &ApiGraph, path: &Path) -> AtlasResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = std::fs::File::create(path)?;
        Self::write_to(graph, &mut file)
    }

    /// Write the graph's document as pretty JSON to any writer.
    pub fn write_to<W: Write>(graph: &ApiGraph, writer: &mut W) -> AtlasResult<()> {
        serde_json::to_writer_pretty(&mut *writer, &Document::from_graph(graph))?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, Interface, Introspection, Source, Type};

    fn sample() -> ApiGraph {
        let mut graph = ApiGraph::new();
        let string = graph.add_type(Type::new(TypeKind::String, "string", ""));
        let user = graph.add_source(Source {
            origin: "a".into(),
            added_from: "a".into(),
            shape: Shape::Interface(Interface {
                fields: vec![Field {
                    name: "name".into(),
                    comment: String::new(),
                    is_required: true,
                    ty: string,
                }],
                ..Interface::new("User", "")
            }),
            used_in: Vec::new(),
        });
        let site = graph.add_type(Type::new(TypeKind::Entity, "", ""));
        let list = graph.add_type(Type {
            generics: vec![site],
            ..Type::new(TypeKind::List, "list", "")
        });
        graph.attach_usage(user, site);

        let void = graph.add_type(Type::void("a"));
        let mut introspection = Introspection::new("a", "a");
        introspection.sources.push(user);
        introspection.controllers.push(Controller {
            name: "UserController".into(),
            base: "/users".into(),
            comment: String::new(),
            origin: "a".into(),
            added_from: "a".into(),
            is_duplicate: false,
            methods: vec![Method {
                name: "list".into(),
                comment: String::new(),
                request: RequestMethod::Get,
                path: "/users".into(),
                params: void,
                query: void,
                payload: Vec::new(),
                response: vec![list],
            }],
            interplay: Vec::new(),
        });
        graph.introspections.push(introspection);
        graph
    }

    #[test]
    fn test_types_inlined() {
        let doc = Document::from_graph(&sample());
        let bucket = doc.bucket("a").unwrap();
        let response = &bucket.controllers[0].methods[0].response[0];

        assert_eq!(response.kind, TypeKind::List);
        assert_eq!(response.generics[0].name, "User");
        assert_eq!(response.generics[0].origin, "a");
        assert_eq!(bucket.sources[0].fields[0].ty.kind, TypeKind::String);
        assert_eq!(doc.source_count(), 1);
        assert_eq!(doc.method_count(), 1);
    }

    #[test]
    fn test_write_to_is_json() {
        let mut out = Vec::new();
        DocumentWriter::write_to(&sample(), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["buckets"][0]["origin"], "a");
        assert_eq!(value["buckets"][0]["sources"][0]["kind"], "Interface");
        assert!(value["buckets"][0]["sources"][0].get("isDuplicate").is_none());
    }

    #[test]
    fn test_write_to_file_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("atlas.json");
        DocumentWriter::write_to_file(&sample(), &path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let doc: Document = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc, Document::from_graph(&sample()));
    }
}
