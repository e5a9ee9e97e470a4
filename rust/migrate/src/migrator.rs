use discovery_error::{DiscoveryError, ErrorCodes};
use discovery_storage::document::{ClusterDocument, InstanceDocument};
use discovery_storage::sql::{
    cluster_from_row, instance_from_row, timestamp_from_micros, CLUSTER_COLUMNS, INSTANCE_COLUMNS,
};
use discovery_storage::{DocumentStore, StorageError, WriteBatch};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use thiserror::Error;

use crate::{Cursor, Entity};

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Failed to read {entity} after {cursor}: {source}")]
    Read {
        entity: Entity,
        cursor: Cursor,
        #[source]
        source: StorageError,
    },
    #[error("Failed to commit {entity} up to {cursor}: {source}")]
    Commit {
        entity: Entity,
        cursor: Cursor,
        #[source]
        source: StorageError,
    },
    #[error("Failed to access the {entity} cursor: {source}")]
    Cursor {
        entity: Entity,
        #[source]
        source: StorageError,
    },
}

impl DiscoveryError for MigrateError {
    fn code(&self) -> ErrorCodes {
        match self {
            MigrateError::Read { source, .. }
            | MigrateError::Commit { source, .. }
            | MigrateError::Cursor { source, .. } => source.code(),
        }
    }
}

/// Records written to the destination in one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub clusters: usize,
    pub instances: usize,
}

/// A page that was committed to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Position of the last record in the page.
    pub cursor: Cursor,
    pub written: usize,
}

pub struct Migrator {
    pool: SqlitePool,
    store: DocumentStore,
    page_size: usize,
}

impl Migrator {
    pub fn new(pool: SqlitePool, store: DocumentStore, page_size: usize) -> Self {
        Self {
            pool,
            store,
            page_size: page_size.max(1),
        }
    }

    /// Copy all clusters, then all instances.
    pub async fn run(&self) -> Result<MigrationReport, MigrateError> {
        let clusters = self.migrate(Entity::Clusters).await?;
        let instances = self.migrate(Entity::Instances).await?;
        Ok(MigrationReport {
            clusters,
            instances,
        })
    }

    /// Copy every record of `entity` after its saved cursor. Returns the
    /// number of records written.
    pub async fn migrate(&self, entity: Entity) -> Result<usize, MigrateError> {
        let mut cursor = self.load_cursor(entity).await?.unwrap_or_default();
        tracing::info!(%entity, %cursor, "Migrating");

        let mut written = 0;
        while let Some(page) = self.migrate_page(entity, &cursor).await? {
            written += page.written;
            tracing::info!(
                %entity,
                cursor = %page.cursor,
                page = page.written,
                written,
                "Committed page"
            );
            cursor = page.cursor;
        }

        tracing::info!(%entity, written, "Finished migrating");
        Ok(written)
    }

    /// Copy the page after `cursor` and save the new cursor. `None` once
    /// there is nothing left.
    pub async fn migrate_page(
        &self,
        entity: Entity,
        cursor: &Cursor,
    ) -> Result<Option<Page>, MigrateError> {
        let Some(page) = self.copy_page(entity, cursor).await? else {
            return Ok(None);
        };
        self.save_cursor(entity, &page.cursor).await?;
        Ok(Some(page))
    }

    /// Read the page after `cursor` and commit it to the destination without
    /// saving the cursor.
    pub async fn copy_page(
        &self,
        entity: Entity,
        cursor: &Cursor,
    ) -> Result<Option<Page>, MigrateError> {
        let read_error = |source: StorageError| MigrateError::Read {
            entity,
            cursor: cursor.clone(),
            source,
        };

        let rows = sqlx::query(&page_query(entity))
            .bind(cursor.created_at.timestamp_micros())
            .bind(&cursor.id)
            .bind(i64::try_from(self.page_size).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error(e.into()))?;

        let mut batch = self.store.batch();
        let mut last = None;
        for row in &rows {
            last = Some(self.stage(entity, row, &mut batch).map_err(read_error)?);
        }
        let Some(last) = last else {
            return Ok(None);
        };

        let written = batch.commit().await.map_err(|source| MigrateError::Commit {
            entity,
            cursor: last.clone(),
            source,
        })?;
        Ok(Some(Page {
            cursor: last,
            written,
        }))
    }

    pub async fn load_cursor(&self, entity: Entity) -> Result<Option<Cursor>, MigrateError> {
        self.store
            .get_opt(&self.store.migration_path(entity.name()))
            .await
            .map_err(|source| MigrateError::Cursor { entity, source })
    }

    async fn save_cursor(&self, entity: Entity, cursor: &Cursor) -> Result<(), MigrateError> {
        self.store
            .put(&self.store.migration_path(entity.name()), cursor)
            .await
            .map_err(|source| MigrateError::Cursor { entity, source })
    }

    /// Decode `row` and stage its document. Returns the row's position.
    fn stage(
        &self,
        entity: Entity,
        row: &SqliteRow,
        batch: &mut WriteBatch<'_>,
    ) -> Result<Cursor, StorageError> {
        let created_at = timestamp_from_micros(row.try_get("created_at")?)?;
        match entity {
            Entity::Clusters => {
                let cluster = cluster_from_row(row)?;
                let path = self.store.cluster_path(&cluster.id);
                batch.set(path, &ClusterDocument::new(&cluster, created_at))?;
                Ok(Cursor::new(created_at, cluster.id))
            }
            Entity::Instances => {
                let instance = instance_from_row(row)?;
                let path = self.store.instance_path(&instance.cluster_id, &instance.url);
                batch.set(path, &InstanceDocument::new(&instance, created_at))?;
                Ok(Cursor::new(created_at, instance.id))
            }
        }
    }
}

fn page_query(entity: Entity) -> String {
    let (columns, table, id) = match entity {
        Entity::Clusters => (CLUSTER_COLUMNS, "clusters", "cluster_id"),
        Entity::Instances => (INSTANCE_COLUMNS, "instances", "instance_id"),
    };
    format!(
        "SELECT {columns} FROM {table} \
         WHERE created_at > $1 OR (created_at = $1 AND {id} > $2) \
         ORDER BY created_at, {id} LIMIT $3"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_orders_by_cursor_columns() {
        let query = page_query(Entity::Instances);
        assert!(query.contains("FROM instances"));
        assert!(query.contains("ORDER BY created_at, instance_id LIMIT $3"));
        assert!(page_query(Entity::Clusters).contains("cluster_id > $2"));
    }
}
