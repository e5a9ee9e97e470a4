//! Document backend: one JSON document per cluster and per instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use discovery_config::Configurable;
use discovery_types::{Cluster, Instance, SshPublicKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DocumentBackendConfig, DocumentStore, Registration, StorageError};

/// Stored at `<base>/clusters/<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDocument {
    pub id: String,
    pub creator_ip: String,
    pub creator_user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl ClusterDocument {
    pub fn new(cluster: &Cluster, created_at: DateTime<Utc>) -> Self {
        ClusterDocument {
            id: cluster.id.clone(),
            creator_ip: cluster.creator_ip.clone(),
            creator_user_agent: cluster.creator_user_agent.clone(),
            created_at,
        }
    }

    pub fn into_cluster(self) -> Cluster {
        Cluster {
            id: self.id,
            creator_ip: self.creator_ip,
            creator_user_agent: self.creator_user_agent,
            created_at: Some(self.created_at),
        }
    }
}

/// Stored at `<base>/clusters/<cluster_id>/instances/<instance_key>`. The
/// cluster id is implied by the parent path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDocument {
    pub id: String,
    #[serde(default)]
    pub flynn_version: String,
    #[serde(default)]
    pub ssh_public_keys: Vec<SshPublicKey>,
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub creator_ip: String,
    pub created_at: DateTime<Utc>,
}

impl InstanceDocument {
    pub fn new(instance: &Instance, created_at: DateTime<Utc>) -> Self {
        InstanceDocument {
            id: instance.id.clone(),
            flynn_version: instance.flynn_version.clone(),
            ssh_public_keys: instance.ssh_public_keys.clone(),
            url: instance.url.clone(),
            name: instance.name.clone(),
            creator_ip: instance.creator_ip.clone(),
            created_at,
        }
    }

    pub fn into_instance(self, cluster_id: String) -> Instance {
        Instance {
            id: self.id,
            cluster_id,
            flynn_version: self.flynn_version,
            ssh_public_keys: self.ssh_public_keys,
            url: self.url,
            name: self.name,
            creator_ip: self.creator_ip,
            created_at: Some(self.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentBackend {
    store: DocumentStore,
}

impl DocumentBackend {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub(crate) async fn create_cluster(&self, cluster: &mut Cluster) -> Result<(), StorageError> {
        let id = Uuid::new_v4().to_string();
        let mut doc = ClusterDocument::new(cluster, Utc::now());
        doc.id = id;
        // A collision on a fresh v4 id is reported as an ordinary failure.
        self.store
            .create(&self.store.cluster_path(&doc.id), &doc)
            .await?;

        cluster.id = doc.id;
        cluster.created_at = Some(doc.created_at);
        tracing::debug!(cluster_id = %cluster.id, "Created cluster");
        Ok(())
    }

    pub(crate) async fn create_instance(
        &self,
        instance: &mut Instance,
    ) -> Result<Registration, StorageError> {
        let path = self
            .store
            .instance_path(&instance.cluster_id, &instance.url);
        let mut doc = InstanceDocument::new(instance, Utc::now());
        doc.id = Uuid::new_v4().to_string();

        match self.store.create(&path, &doc).await {
            Ok(()) => {
                instance.id = doc.id;
                instance.created_at = Some(doc.created_at);
                tracing::debug!(
                    cluster_id = %instance.cluster_id,
                    instance_id = %instance.id,
                    "Created instance"
                );
                Ok(Registration::Created)
            }
            Err(StorageError::Document(object_store::Error::AlreadyExists { .. })) => {
                let existing: InstanceDocument = self.store.get(&path).await?;
                let cluster_id = std::mem::take(&mut instance.cluster_id);
                *instance = existing.into_instance(cluster_id);
                tracing::warn!(
                    cluster_id = %instance.cluster_id,
                    instance_id = %instance.id,
                    "Instance already registered"
                );
                Ok(Registration::Existing)
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) async fn get_cluster_instances(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<Instance>, StorageError> {
        let paths = self
            .store
            .list(&self.store.instances_path(cluster_id))
            .await?;
        let docs: Vec<InstanceDocument> = self.store.get_all(&paths).await?;
        Ok(docs
            .into_iter()
            .map(|doc| doc.into_instance(cluster_id.to_string()))
            .collect())
    }
}

#[async_trait]
impl Configurable<DocumentBackendConfig, StorageError> for DocumentBackend {
    async fn try_from_config(config: &DocumentBackendConfig) -> Result<Self, StorageError> {
        Ok(DocumentBackend::new(
            DocumentStore::try_from_config(config).await?,
        ))
    }
}
