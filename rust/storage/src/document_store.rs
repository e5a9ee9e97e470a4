use std::sync::Arc;

use async_trait::async_trait;
use discovery_config::Configurable;
use futures::future::try_join_all;
use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{DocumentBackendConfig, ObjectStoreConfig, StorageError};

/// JSON documents in an object store, addressed by path under a common base.
///
/// Layout:
/// - `<base>/clusters/<cluster_id>`
/// - `<base>/clusters/<cluster_id>/instances/<instance_key>`
/// - `<base>/migrations/<name>`
///
/// Each segment is percent-encoded by [`object_store::path::PathPart`], so ids
/// containing `/` or other reserved characters stay a single segment.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    store: Arc<dyn ObjectStore>,
    base: Path,
}

impl DocumentStore {
    pub fn new(store: Arc<dyn ObjectStore>, base: &str) -> Result<Self, StorageError> {
        Ok(Self {
            store,
            base: Path::parse(base)?,
        })
    }

    pub fn cluster_path(&self, cluster_id: &str) -> Path {
        self.base.child("clusters").child(cluster_id)
    }

    pub fn instances_path(&self, cluster_id: &str) -> Path {
        self.cluster_path(cluster_id).child("instances")
    }

    pub fn instance_path(&self, cluster_id: &str, url: &str) -> Path {
        self.instances_path(cluster_id)
            .child(discovery_types::instance_key(cluster_id, url))
    }

    pub fn migration_path(&self, name: &str) -> Path {
        self.base.child("migrations").child(name)
    }

    /// Write `doc` only if nothing exists at `path`. A lost race surfaces as
    /// `object_store::Error::AlreadyExists`.
    pub async fn create<T: Serialize>(&self, path: &Path, doc: &T) -> Result<(), StorageError> {
        let options = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        self.store.put_opts(path, encode(doc)?, options).await?;
        Ok(())
    }

    /// Unconditional write.
    pub async fn put<T: Serialize>(&self, path: &Path, doc: &T) -> Result<(), StorageError> {
        self.store.put(path, encode(doc)?).await?;
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StorageError> {
        let bytes = self.store.get(path).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(StorageError::decode("document"))
    }

    pub async fn get_opt<T: DeserializeOwned>(
        &self,
        path: &Path,
    ) -> Result<Option<T>, StorageError> {
        match self.get(path).await {
            Ok(doc) => Ok(Some(doc)),
            Err(StorageError::Document(object_store::Error::NotFound { .. })) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Every document path below `prefix`, at any depth.
    pub async fn list(&self, prefix: &Path) -> Result<Vec<Path>, StorageError> {
        let objects: Vec<_> = self.store.list(Some(prefix)).try_collect().await?;
        Ok(objects.into_iter().map(|meta| meta.location).collect())
    }

    /// Fetch all `paths` concurrently. Fails as a whole if any read fails.
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        paths: &[Path],
    ) -> Result<Vec<T>, StorageError> {
        try_join_all(paths.iter().map(|path| self.get(path))).await
    }

    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch {
            store: self,
            writes: Vec::new(),
        }
    }
}

fn encode<T: Serialize>(doc: &T) -> Result<PutPayload, StorageError> {
    let bytes = serde_json::to_vec(doc).map_err(StorageError::encode("document"))?;
    Ok(PutPayload::from(bytes))
}

/// Overwrite writes staged in memory and issued together by [`commit`].
///
/// Object stores have no multi-object transaction, so a failed commit can
/// leave a subset of the writes applied. Callers only stage idempotent
/// overwrites and treat any failure as "nothing committed".
///
/// [`commit`]: WriteBatch::commit
pub struct WriteBatch<'a> {
    store: &'a DocumentStore,
    writes: Vec<(Path, PutPayload)>,
}

impl WriteBatch<'_> {
    pub fn set<T: Serialize>(&mut self, path: Path, doc: &T) -> Result<(), StorageError> {
        self.writes.push((path, encode(doc)?));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Returns the number of documents written.
    pub async fn commit(self) -> Result<usize, StorageError> {
        let store = &self.store.store;
        let written = self.writes.len();
        try_join_all(
            self.writes
                .into_iter()
                .map(|(path, payload)| async move { store.put(&path, payload).await }),
        )
        .await?;
        Ok(written)
    }
}

#[async_trait]
impl Configurable<DocumentBackendConfig, StorageError> for DocumentStore {
    async fn try_from_config(config: &DocumentBackendConfig) -> Result<Self, StorageError> {
        let store: Arc<dyn ObjectStore> = match &config.object_store {
            ObjectStoreConfig::Memory => Arc::new(InMemory::new()),
            ObjectStoreConfig::Gcs(gcs) => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(&gcs.bucket)
                    .build()?,
            ),
        };
        DocumentStore::new(store, &config.base)
    }
}
