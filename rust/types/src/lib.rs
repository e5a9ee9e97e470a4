//! Records stored by the discovery registry.
//!
//! A [`Cluster`] owns zero or more [`Instance`]s. Both are written once and
//! never updated; the storage backend assigns `id` and `created_at` on create.
//! The durable identity of an instance is `(cluster_id, url)`, see
//! [`instance_key`].

mod cluster;
mod instance;
mod instance_key;

pub use cluster::*;
pub use instance::*;
pub use instance_key::*;
