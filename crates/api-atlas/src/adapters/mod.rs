//! Stock adapters.

pub mod spring;
pub mod swagger;

use std::sync::Arc;

use crate::adapter::Adapter;

pub use spring::SpringAdapter;
pub use swagger::SwaggerAdapter;

/// Look up a stock adapter by its name.
pub fn by_name(name: &str) -> Option<Arc<dyn Adapter>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "spring" => Some(Arc::new(SpringAdapter::new())),
        "swagger" => Some(Arc::new(SwaggerAdapter::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("Spring").map(|a| a.name().to_string()).as_deref(), Some("spring"));
        assert!(by_name("swagger").is_some());
        assert!(by_name("jaxrs").is_none());
    }
}
