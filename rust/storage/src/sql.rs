//! Relational backend on SQLite.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use discovery_config::Configurable;
use discovery_types::{Cluster, Instance, SshPublicKey};
use futures::TryStreamExt;
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::fs::create_dir_all;

use crate::{Registration, SqlBackendConfig, StorageError};

pub const SCHEMA: &str = include_str!("../schema/discovery.sql");

pub const CLUSTER_COLUMNS: &str = "cluster_id, creator_ip, creator_user_agent, created_at";
pub const INSTANCE_COLUMNS: &str =
    "instance_id, cluster_id, flynn_version, ssh_public_keys, url, name, creator_ip, created_at";

// SQLite reports unique violations as "UNIQUE constraint failed: <table>.<column>, ..."
const UNIQUE_VIOLATION_PREFIX: &str = "UNIQUE constraint failed: ";
const INSTANCE_IDENTITY_COLUMNS: [&str; 2] = ["instances.cluster_id", "instances.url"];

#[derive(Debug, Clone)]
pub struct SqlBackend {
    pool: SqlitePool,
}

impl SqlBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the tables and indexes if they don't exist.
    pub async fn initialize_schema(&self) -> Result<(), StorageError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) async fn create_cluster(&self, cluster: &mut Cluster) -> Result<(), StorageError> {
        let row = sqlx::query(
            "INSERT INTO clusters (creator_ip, creator_user_agent) VALUES ($1, $2) \
             RETURNING cluster_id, created_at",
        )
        .bind(&cluster.creator_ip)
        .bind(&cluster.creator_user_agent)
        .fetch_one(&self.pool)
        .await?;

        cluster.id = row.try_get("cluster_id")?;
        cluster.created_at = Some(timestamp_from_micros(row.try_get("created_at")?)?);
        tracing::debug!(cluster_id = %cluster.id, "Created cluster");
        Ok(())
    }

    pub(crate) async fn create_instance(
        &self,
        instance: &mut Instance,
    ) -> Result<Registration, StorageError> {
        let ssh_public_keys = serde_json::to_string(&instance.ssh_public_keys)
            .map_err(StorageError::encode("ssh public keys"))?;
        let result = sqlx::query(
            "INSERT INTO instances (cluster_id, flynn_version, ssh_public_keys, url, name, creator_ip) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING instance_id, created_at",
        )
        .bind(&instance.cluster_id)
        .bind(&instance.flynn_version)
        .bind(ssh_public_keys)
        .bind(&instance.url)
        .bind(&instance.name)
        .bind(&instance.creator_ip)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                instance.id = row.try_get("instance_id")?;
                instance.created_at = Some(timestamp_from_micros(row.try_get("created_at")?)?);
                tracing::debug!(
                    cluster_id = %instance.cluster_id,
                    instance_id = %instance.id,
                    "Created instance"
                );
                Ok(Registration::Created)
            }
            Err(err) if is_instance_conflict(&err) => {
                let row = sqlx::query(&format!(
                    "SELECT {INSTANCE_COLUMNS} FROM instances WHERE cluster_id = $1 AND url = $2"
                ))
                .bind(&instance.cluster_id)
                .bind(&instance.url)
                .fetch_one(&self.pool)
                .await?;
                *instance = instance_from_row(&row)?;
                tracing::warn!(
                    cluster_id = %instance.cluster_id,
                    instance_id = %instance.id,
                    "Instance already registered"
                );
                Ok(Registration::Existing)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub(crate) async fn get_cluster_instances(
        &self,
        cluster_id: &str,
    ) -> Result<Vec<Instance>, StorageError> {
        let query = format!("SELECT {INSTANCE_COLUMNS} FROM instances WHERE cluster_id = $1");
        let mut rows = sqlx::query(&query).bind(cluster_id).fetch(&self.pool);

        let mut instances = Vec::new();
        while let Some(row) = rows.try_next().await? {
            instances.push(instance_from_row(&row)?);
        }
        Ok(instances)
    }
}

/// True only for a unique violation on exactly the `(cluster_id, url)` key of
/// the instances table. Primary key collisions and other constraints are
/// ordinary failures.
pub fn is_instance_conflict(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };
    if db_err.kind() != ErrorKind::UniqueViolation {
        return false;
    }
    let Some(columns) = db_err.message().strip_prefix(UNIQUE_VIOLATION_PREFIX) else {
        return false;
    };
    let mut columns: Vec<&str> = columns.split(',').map(str::trim).collect();
    columns.sort_unstable();
    columns == INSTANCE_IDENTITY_COLUMNS
}

pub fn timestamp_from_micros(micros: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(micros).ok_or(StorageError::InvalidTimestamp(micros))
}

/// Decode a row selected with [`CLUSTER_COLUMNS`].
pub fn cluster_from_row(row: &SqliteRow) -> Result<Cluster, StorageError> {
    Ok(Cluster {
        id: row.try_get("cluster_id")?,
        creator_ip: row.try_get("creator_ip")?,
        creator_user_agent: row.try_get("creator_user_agent")?,
        created_at: Some(timestamp_from_micros(row.try_get("created_at")?)?),
    })
}

/// Decode a row selected with [`INSTANCE_COLUMNS`].
pub fn instance_from_row(row: &SqliteRow) -> Result<Instance, StorageError> {
    let ssh_public_keys: String = row.try_get("ssh_public_keys")?;
    let ssh_public_keys: Vec<SshPublicKey> = serde_json::from_str(&ssh_public_keys)
        .map_err(StorageError::decode("ssh public keys"))?;
    Ok(Instance {
        id: row.try_get("instance_id")?,
        cluster_id: row.try_get("cluster_id")?,
        flynn_version: row.try_get("flynn_version")?,
        ssh_public_keys,
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        creator_ip: row.try_get("creator_ip")?,
        created_at: Some(timestamp_from_micros(row.try_get("created_at")?)?),
    })
}

#[async_trait]
impl Configurable<SqlBackendConfig, StorageError> for SqlBackend {
    async fn try_from_config(config: &SqlBackendConfig) -> Result<Self, StorageError> {
        // Instances may reference clusters that live in another store.
        let conn_options = SqliteConnectOptions::new()
            .pragma("foreign_keys", "OFF")
            .busy_timeout(Duration::from_secs(30));
        let pool = if let Some(url) = &config.url {
            let path = Path::new(url);
            if let Some(parent) = path.parent() {
                create_dir_all(parent).await.map_err(sqlx::Error::Io)?;
            }
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .connect_with(conn_options.filename(path).create_if_missing(true))
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_lifetime(None)
                .idle_timeout(None)
                .max_connections(1)
                .connect_with(conn_options.in_memory(true).shared_cache(true))
                .await?
        };

        let backend = SqlBackend::new(pool);
        if config.initialize_schema {
            backend.initialize_schema().await?;
        }
        Ok(backend)
    }
}
