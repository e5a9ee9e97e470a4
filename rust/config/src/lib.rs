use async_trait::async_trait;
use discovery_error::DiscoveryError;

pub mod helpers;

pub use helpers::{load_section, ConfigError, CONFIG_PATH_ENV_VAR, DEFAULT_CONFIG_PATH};

/// A component that can be built from its configuration.
///
/// Backends and services implement this so that the binaries can select and
/// construct them once at startup from a deserialized config value.
#[async_trait]
pub trait Configurable<T, E = Box<dyn DiscoveryError>> {
    async fn try_from_config(config: &T) -> Result<Self, E>
    where
        Self: Sized;
}
