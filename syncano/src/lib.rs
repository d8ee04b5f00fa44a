//! Client library for the Syncano object storage API
//!
//! Open a connection once, then query and mutate objects through the lazy
//! manager exposed by every model:
//!
//! ```rust,no_run
//! use futures::TryStreamExt;
//! use syncano::{ConnectionConfig, default_connection, instance};
//!
//! # async fn demo() -> syncano::Result<()> {
//! default_connection().open(ConnectionConfig::from_env())?;
//!
//! let mut instances = instance().please().list(()).limit(10)?.stream();
//! while let Some(item) = instances.try_next().await? {
//!     println!("{:?}", item.get("name"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;

pub use api::*;
