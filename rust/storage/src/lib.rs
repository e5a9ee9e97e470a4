//! Persistence for clusters and instances.
//!
//! [`StorageBackend`] is the single entry point used by the service. It is
//! selected once from [`StorageConfig`] and dispatches to either the
//! relational [`SqlBackend`] or the object store backed [`DocumentBackend`].
//! Both enforce at most one instance per `(cluster_id, url)`: the relational
//! store through a unique constraint, the document store by writing under
//! [`discovery_types::instance_key`] with a create-if-absent put.

mod backend;
pub mod config;
pub mod document;
mod document_store;
mod error;
pub mod sql;

pub use backend::*;
pub use config::*;
pub use document::DocumentBackend;
pub use document_store::*;
pub use error::*;
pub use sql::SqlBackend;
