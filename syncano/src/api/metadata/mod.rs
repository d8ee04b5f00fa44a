//! Model metadata: field and endpoint descriptions, built-in models, and the
//! registry of synthesized per-class models.

pub mod builtin;
pub mod models;
pub mod naming;
pub mod registry;

pub use builtin::{class, instance, object, webhook};
pub use models::{EndpointMeta, FieldMeta, FieldType, ModelKind, ModelMeta};
pub use naming::class_name;
pub use registry::{Registry, registry};
