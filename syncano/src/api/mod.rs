//! Syncano API client
//!
//! Connection handling, model metadata, and the lazy [`Manager`] used to query
//! and mutate remote objects.

pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod metadata;
pub mod record;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConnectionConfig, ConnectionConfigBuilder};
pub use connection::{Connection, DefaultConnection, IntoMethod, RequestOptions, default_connection};
pub use error::{Error, Result};
pub use manager::{
    Args, Item, ItemStream, Lookup, Manager, Page, Response, SchemaField, SchemaManager,
};
pub use metadata::{
    EndpointMeta, FieldMeta, FieldType, ModelKind, ModelMeta, Registry, class, class_name,
    instance, object, registry, webhook,
};
pub use record::Record;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
