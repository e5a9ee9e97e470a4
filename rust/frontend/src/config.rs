use discovery_config::{load_section, ConfigError, CONFIG_PATH_ENV_VAR, DEFAULT_CONFIG_PATH};
use discovery_storage::StorageConfig;
use discovery_tracing::OtelFilter;
use serde::Deserialize;

pub const CONFIG_SECTION: &str = "discovery_service";

#[derive(Deserialize, Clone, Debug)]
pub struct DiscoveryServiceConfig {
    #[serde(default = "DiscoveryServiceConfig::default_port")]
    pub port: u16,
    /// Public base URL, used to build `Location` headers.
    #[serde(default)]
    pub url: String,
    pub storage: StorageConfig,
    #[serde(default = "DiscoveryServiceConfig::default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub otel_endpoint: Option<String>,
    #[serde(default)]
    pub otel_filters: Vec<OtelFilter>,
}

impl DiscoveryServiceConfig {
    fn default_port() -> u16 {
        8000
    }

    fn default_service_name() -> String {
        "discovery-service".to_string()
    }

    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_PATH_ENV_VAR) {
            Ok(path) => Self::load_from_path(&path),
            Err(_) => Self::load_from_path(DEFAULT_CONFIG_PATH),
        }
    }

    pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
        load_section(path, CONFIG_SECTION)
    }
}
