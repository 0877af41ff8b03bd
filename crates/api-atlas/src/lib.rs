//! ApiAtlas — cross-service type graph construction, structural comparison, and unification.

pub mod adapter;
pub mod adapters;
pub mod comment;
pub mod comparator;
pub mod controller;
pub mod document;
pub mod entity;
pub mod introspector;
pub mod naming;
pub mod origin;
pub mod type_graph;
pub mod types;
pub mod unificator;

pub use adapter::{Adapter, AdapterChain, ArgumentContext};
pub use adapters::{SpringAdapter, SwaggerAdapter};
pub use comparator::Comparator;
pub use controller::ControllerBuilder;
pub use document::{Document, DocumentWriter};
pub use entity::{Description, Entity, EntityIndex};
pub use introspector::{
    EntityProvider, FileProvider, Introspector, IntrospectorConfig, Origin, StaticProvider,
};
pub use naming::NamingResolver;
pub use origin::{BucketRule, BucketRules, OriginParser};
pub use type_graph::TypeGraphBuilder;
pub use types::*;
pub use unificator::{Strategy, Unificator};
