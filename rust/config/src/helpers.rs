use discovery_error::{DiscoveryError, ErrorCodes};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub const CONFIG_PATH_ENV_VAR: &str = "CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "./discovery_config.yaml";
const ENV_PREFIX: &str = "DISCOVERY_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Invalid(Box::new(err))
    }
}

impl DiscoveryError for ConfigError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::InvalidArgument
    }
}

fn figment_from_path(path: &str) -> Figment {
    // figment can't express nesting with single underscores, so `__` in an
    // environment variable separates levels: DISCOVERY_A__B -> a.b
    let mut f = Figment::from(
        Env::prefixed(ENV_PREFIX).map(|k| k.as_str().replace("__", ".").into()),
    );
    if std::path::Path::new(path).exists() {
        f = Figment::from(Yaml::file(path)).merge(f);
    }
    f
}

/// Extract the top level `section` of the YAML file at `path`, with
/// `DISCOVERY_`-prefixed environment variables layered on top.
pub fn load_section<T: DeserializeOwned>(path: &str, section: &str) -> Result<T, ConfigError> {
    Ok(figment_from_path(path).extract_inner(section)?)
}
