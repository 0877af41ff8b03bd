//! Swagger annotation support: declared response types and doc text.

use crate::adapter::Adapter;
use crate::entity::{Annotated, MethodEntity, TypeEntity};

/// Adapter reading `ApiOperation`, `ApiParam`, and `ApiModelProperty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwaggerAdapter;

impl SwaggerAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Whether `candidate` or any of its generic arguments looks like `declared`.
fn mentions(candidate: &TypeEntity, declared: &TypeEntity) -> bool {
    let named = !candidate.name.is_empty() && !declared.name.is_empty();
    if named && (candidate.name.contains(&declared.name) || declared.name.contains(&candidate.name)) {
        return true;
    }
    candidate
        .generics
        .iter()
        .filter_map(|g| g.ty.as_ref())
        .any(|t| mentions(t, declared))
}

impl Adapter for SwaggerAdapter {
    fn name(&self) -> &str {
        "swagger"
    }

    fn get_method_returns(&self, method: &MethodEntity, mut previous: Vec<TypeEntity>) -> Vec<TypeEntity> {
        let Some(declared) = method.annotation("ApiOperation").and_then(|a| a.ty("response")) else {
            return previous;
        };

        if !previous.iter().any(|p| mentions(p, declared)) {
            previous.push(declared.clone());
        }
        previous
    }

    fn get_comment(&self, subject: &dyn Annotated, previous: String) -> String {
        if let Some(operation) = subject.annotation("ApiOperation") {
            let mut comment = operation.text("value").unwrap_or_default();
            if let Some(notes) = operation.text("notes").filter(|n| !n.is_empty()) {
                comment.push('\n');
                comment.push_str(&notes);
            }
            comment
        } else if let Some(param) = subject.annotation("ApiParam") {
            param.text("value").unwrap_or(previous)
        } else if let Some(property) = subject.annotation("ApiModelProperty") {
            property.text("notes").unwrap_or(previous)
        } else {
            previous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterChain;
    use crate::entity::{ArgumentEntity, FieldEntity};
    use serde_json::json;
    use std::sync::Arc;

    fn chain() -> AdapterChain {
        AdapterChain::new(vec![Arc::new(SwaggerAdapter::new())])
    }

    #[test]
    fn test_declared_response_added_once() {
        let method: MethodEntity = serde_json::from_value(json!({
            "Name": "list",
            "Returns": { "Name": "ResponseEntity", "Path": "org.springframework.http.ResponseEntity" },
            "Annotations": { "ApiOperation": { "Items": {
                "response": { "Content": "User.class", "Type": { "Name": "User", "Path": "com.acme.User" } }
            }}}
        }))
        .unwrap();

        let returns = chain().get_method_returns(&method);
        let names: Vec<&str> = returns.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["ResponseEntity", "User"]);
    }

    #[test]
    fn test_similar_generic_return_suppresses_declared() {
        let method: MethodEntity = serde_json::from_value(json!({
            "Name": "list",
            "Returns": { "Name": "List", "Path": "java.util.List", "Generics": [
                { "Name": "User", "Position": 0, "Type": { "Name": "User", "Path": "com.acme.User" } }
            ]},
            "Annotations": { "ApiOperation": { "Items": {
                "response": { "Type": { "Name": "User", "Path": "com.acme.User" } }
            }}}
        }))
        .unwrap();

        assert_eq!(chain().get_method_returns(&method).len(), 1);
    }

    #[test]
    fn test_operation_comment_with_notes() {
        let method: MethodEntity = serde_json::from_value(json!({
            "Name": "find",
            "Comment": "/** ignored */",
            "Annotations": { "ApiOperation": { "Items": {
                "value": { "Content": "Find users" },
                "notes": { "Content": "Paged" }
            }}}
        }))
        .unwrap();

        assert_eq!(chain().get_comment(&method), "Find users\nPaged");
    }

    #[test]
    fn test_param_and_property_comments() {
        let argument: ArgumentEntity = serde_json::from_value(json!({
            "Name": "id",
            "Annotations": { "ApiParam": { "Items": { "value": { "Content": "User id" } } } }
        }))
        .unwrap();
        assert_eq!(chain().get_comment(&argument), "User id");

        let field: FieldEntity = serde_json::from_value(json!({
            "Name": "email",
            "Comment": "fallback",
            "Annotations": { "ApiModelProperty": { "Items": {} } }
        }))
        .unwrap();
        assert_eq!(chain().get_comment(&field), "fallback");
    }
}
