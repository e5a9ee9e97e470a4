use discovery_config::{load_section, ConfigError};
use discovery_storage::{DocumentBackendConfig, SqlBackendConfig};
use discovery_tracing::OtelFilter;
use serde::Deserialize;

pub const CONFIG_SECTION: &str = "migrate_storage";

fn default_page_size() -> usize {
    100
}

fn default_service_name() -> String {
    "migrate-storage".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrateConfig {
    pub source: SqlBackendConfig,
    pub destination: DocumentBackendConfig,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub otel_endpoint: Option<String>,
    #[serde(default)]
    pub otel_filters: Vec<OtelFilter>,
}

impl MigrateConfig {
    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        load_section(path, CONFIG_SECTION)
    }
}
