pub mod config;
mod errors;
mod server;
mod source_ip;

use discovery_config::Configurable;
use discovery_storage::StorageBackend;

pub use config::DiscoveryServiceConfig;
pub use errors::ServerError;
pub use server::DiscoveryServer;
pub use source_ip::SourceIp;

pub async fn discovery_service_entrypoint() -> Result<(), Box<dyn std::error::Error>> {
    let config = DiscoveryServiceConfig::load()?;
    discovery_tracing::init_otel_tracing(
        &config.service_name,
        &config.otel_filters,
        config.otel_endpoint.as_deref(),
    )?;

    let backend = StorageBackend::try_from_config(&config.storage).await?;
    let server = DiscoveryServer::new(config.url.clone(), backend);
    server.run(config.port).await?;
    Ok(())
}
