use serde::{Deserialize, Serialize};

fn default_max_connections() -> u32 {
    10
}

fn default_base() -> String {
    "discovery".to_string()
}

/// Selects the backend for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageConfig {
    Sql(SqlBackendConfig),
    Document(DocumentBackendConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlBackendConfig {
    // Path of the SQLite database file.
    // If unspecified, then the database is in memory only
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    // Create the tables if they don't exist. The schema is otherwise assumed
    // to be managed outside of this service.
    #[serde(default)]
    pub initialize_schema: bool,
}

impl Default for SqlBackendConfig {
    fn default() -> Self {
        SqlBackendConfig {
            url: None,
            max_connections: default_max_connections(),
            initialize_schema: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentBackendConfig {
    /// Prefix under which all documents are written.
    #[serde(default = "default_base")]
    pub base: String,
    pub object_store: ObjectStoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    Memory,
    Gcs(GcsConfig),
}

/// Credentials are read from the standard `GOOGLE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcsConfig {
    pub bucket: String,
}
