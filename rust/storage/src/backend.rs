use async_trait::async_trait;
use discovery_config::Configurable;
use discovery_types::{Cluster, Instance};

use crate::{DocumentBackend, SqlBackend, StorageConfig, StorageError};

/// Outcome of a successful [`StorageBackend::create_instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First registration of `(cluster_id, url)`; `id` and `created_at` were
    /// assigned.
    Created,
    /// `(cluster_id, url)` was already registered. The instance now holds the
    /// stored record.
    Existing,
}

/// The storage used by the service, chosen once at startup.
///
/// Operations are plain futures: dropping one cancels the in-flight store
/// call. Nothing here retries or imposes a timeout.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    Sql(SqlBackend),
    Document(DocumentBackend),
}

impl StorageBackend {
    /// Assigns `cluster.id` and `cluster.created_at`, overwriting any
    /// caller-supplied values.
    pub async fn create_cluster(&self, cluster: &mut Cluster) -> Result<(), StorageError> {
        match self {
            StorageBackend::Sql(sql) => sql.create_cluster(cluster).await,
            StorageBackend::Document(doc) => doc.create_cluster(cluster).await,
        }
    }

    pub async fn create_instance(
        &self,
        instance: &mut Instance,
    ) -> Result<Registration, StorageError> {
        match self {
            StorageBackend::Sql(sql) => sql.create_instance(instance).await,
            StorageBackend::Document(doc) => doc.create_instance(instance).await,
        }
    }

    /// An unknown cluster has no instances.
    pub async fn get_cluster_instances(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<Instance>, StorageError> {
        match self {
            StorageBackend::Sql(sql) => sql.get_cluster_instances(cluster_id).await,
            StorageBackend::Document(doc) => doc.get_cluster_instances(cluster_id).await,
        }
    }
}

#[async_trait]
impl Configurable<StorageConfig, StorageError> for StorageBackend {
    async fn try_from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        match config {
            StorageConfig::Sql(sql_config) => {
                tracing::info!("Using SQL storage backend");
                Ok(StorageBackend::Sql(
                    SqlBackend::try_from_config(sql_config).await?,
                ))
            }
            StorageConfig::Document(doc_config) => {
                tracing::info!(base = %doc_config.base, "Using document storage backend");
                Ok(StorageBackend::Document(
                    DocumentBackend::try_from_config(doc_config).await?,
                ))
            }
        }
    }
}
