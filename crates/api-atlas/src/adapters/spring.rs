//! Spring MVC reading of controllers, DTOs, and Java types.

use std::sync::OnceLock;

use regex::Regex;

use crate::adapter::{Adapter, ArgumentContext};
use crate::entity::{is_public, Annotated, Description, Entity, FieldEntity, MethodEntity, TypeEntity};
use crate::naming::lower_first;
use crate::types::{Field, RequestMethod, Rest, TypeId, TypeKind};

const ENTRY_ANNOTATIONS: [&str; 3] = ["RestController", "Controller", "Service"];

const VERB_MAPPINGS: [(&str, RequestMethod); 4] = [
    ("GetMapping", RequestMethod::Get),
    ("PostMapping", RequestMethod::Post),
    ("PutMapping", RequestMethod::Put),
    ("DeleteMapping", RequestMethod::Delete),
];

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("placeholder regex is valid"))
}

fn synthetic_argument() -> &'static Regex {
    static SYNTHETIC: OnceLock<Regex> = OnceLock::new();
    SYNTHETIC.get_or_init(|| Regex::new(r"^arg\d+$").expect("argument regex is valid"))
}

fn identifier() -> &'static Regex {
    static IDENTIFIER: OnceLock<Regex> = OnceLock::new();
    IDENTIFIER.get_or_init(|| Regex::new(r"^[_A-Za-z][_0-9A-Za-z]*$").expect("identifier regex is valid"))
}

/// Adapter for Spring MVC annotated Java sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpringAdapter;

impl SpringAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Adapter for SpringAdapter {
    fn name(&self) -> &str {
        "spring"
    }

    fn query_entry_points<'a>(
        &self,
        description: &'a Description,
        mut previous: Vec<&'a Entity>,
        _origin: &str,
    ) -> Vec<&'a Entity> {
        previous.extend(
            description
                .entities()
                .into_iter()
                .filter(|e| ENTRY_ANNOTATIONS.iter().any(|a| e.has_annotation(a))),
        );
        previous
    }

    fn get_base_path(&self, entry: &Entity, _previous: String) -> String {
        entry
            .annotation("RequestMapping")
            .and_then(|a| a.text("value"))
            .unwrap_or_else(|| "/".to_string())
    }

    fn is_required(&self, member: &dyn Annotated, _previous: bool) -> bool {
        if member.has_annotation("Id") || member.has_annotation("NotNull") {
            return true;
        }
        member
            .annotation("Column")
            .and_then(|c| c.flag("nullable"))
            .map(|nullable| !nullable)
            .unwrap_or(false)
    }

    fn has_params_in_path(&self, path: &str, _previous: bool) -> bool {
        path.contains('{') || path.contains('}')
    }

    fn get_params_from_path(&self, path: &str, mut previous: Vec<String>) -> Vec<String> {
        previous.extend(placeholder().captures_iter(path).map(|c| c[1].to_string()));
        previous
    }

    fn get_method_payload(
        &self,
        ctx: &ArgumentContext<'_>,
        mut previous: Vec<TypeId>,
    ) -> Vec<TypeId> {
        if ctx.argument.has_annotation("RequestBody") {
            previous.push(ctx.ty);
        }
        previous
    }

    fn get_query_fields(&self, ctx: &ArgumentContext<'_>, mut previous: Vec<Field>) -> Vec<Field> {
        if let Some(param) = ctx.argument.annotation("RequestParam") {
            let name = param
                .text("value")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| ctx.argument.name.clone());
            previous.push(Field {
                name,
                comment: ctx.comment.to_string(),
                is_required: false,
                ty: ctx.ty,
            });
        }
        previous
    }

    fn get_params_fields(&self, ctx: &ArgumentContext<'_>, mut previous: Vec<Field>) -> Vec<Field> {
        if let Some(variable) = ctx.argument.annotation("PathVariable") {
            let mut name = variable
                .text("value")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| ctx.argument.name.clone());

            if synthetic_argument().is_match(&name) {
                if let Some(from_path) = ctx.params_in_path.get(ctx.current_param) {
                    name = from_path.clone();
                }
            }

            previous.push(Field {
                name,
                comment: ctx.comment.to_string(),
                is_required: true,
                ty: ctx.ty,
            });
        }
        previous
    }

    fn extract_field_from_method(&self, method: &MethodEntity, previous: Option<String>) -> Option<String> {
        if let Some(property) = method.annotation("JsonProperty") {
            if let Some(name) = property.text("value") {
                return Some(name.trim().to_string());
            }
        }

        if is_public(&method.modifiers) {
            for prefix in ["get", "is"] {
                if let Some(rest) = method.name.strip_prefix(prefix) {
                    if !rest.is_empty() {
                        return Some(lower_first(rest));
                    }
                }
            }
        }

        previous
    }

    fn get_kind(&self, entity: &TypeEntity, previous: TypeKind) -> TypeKind {
        let path = entity.path.as_str();

        if path.contains("boolean") || path == "java.lang.Boolean" {
            TypeKind::Boolean
        } else if path.contains("Date") || path.contains("LocalDateTime") {
            TypeKind::Date
        } else if entity.is_array
            || path.contains("java.util.List")
            || path.contains("java.util.Collection")
            || path.contains("java.util.Set")
        {
            TypeKind::List
        } else if path.contains("java.util.Map") {
            TypeKind::Map
        } else if path.contains("number") || is_java_number(path) {
            TypeKind::Number
        } else if path.contains("string") || path.contains("char") || path == "java.lang.String" {
            TypeKind::String
        } else if entity.is_parameter {
            TypeKind::TypeParameter
        } else if entity.name.eq_ignore_ascii_case("void") {
            TypeKind::Void
        } else if path.contains("java") || path.contains('$') {
            TypeKind::Object
        } else if path.is_empty() {
            previous
        } else {
            TypeKind::Entity
        }
    }

    fn get_rest(&self, method: &MethodEntity, previous: Option<Rest>) -> Option<Rest> {
        let mut rest = previous;

        if let Some(mapping) = method.annotation("RequestMapping") {
            let request = mapping
                .text("method")
                .and_then(|m| RequestMethod::parse(&m))
                .unwrap_or(RequestMethod::Get);
            rest = Some(Rest {
                request,
                path: mapping.text("value").unwrap_or_default(),
            });
        }

        for (annotation, request) in VERB_MAPPINGS {
            if let Some(mapping) = method.annotation(annotation) {
                rest = Some(Rest {
                    request,
                    path: mapping.text("value").unwrap_or_default(),
                });
            }
        }

        rest
    }

    fn get_entry_name(&self, _entry: &Entity, previous: String, origin: &str) -> String {
        let mut name = previous;

        if let Some(position) = name.to_lowercase().find("controller") {
            name.truncate(position);
        }

        if !name.eq_ignore_ascii_case(origin) && name.to_lowercase().starts_with(&origin.to_lowercase()) {
            if let Some(stripped) = name.get(origin.len()..) {
                if identifier().is_match(stripped) {
                    name = stripped.to_string();
                }
            }
        }

        name
    }

    fn should_add_field(&self, field: &FieldEntity, _previous: bool) -> bool {
        is_public(&field.modifiers)
    }
}

fn is_java_number(path: &str) -> bool {
    matches!(
        path,
        "java.lang.Integer"
            | "java.lang.Long"
            | "java.lang.Short"
            | "java.lang.Byte"
            | "java.lang.Float"
            | "java.lang.Double"
            | "java.math.BigDecimal"
            | "java.math.BigInteger"
    )
}
