//! Copies clusters and instances from the SQL store into the document store.

use clap::Parser;
use discovery_config::{Configurable, CONFIG_PATH_ENV_VAR, DEFAULT_CONFIG_PATH};
use discovery_migrate::{MigrateConfig, Migrator};
use discovery_storage::{DocumentStore, SqlBackend};
use discovery_tracing::init_otel_tracing;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path of the YAML config file. Falls back to $CONFIG_PATH.
    #[arg(long)]
    config: Option<String>,

    /// Records per page, overriding the config file.
    #[arg(long)]
    page_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let path = args
        .config
        .or_else(|| std::env::var(CONFIG_PATH_ENV_VAR).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = MigrateConfig::load_from_path(&path)?;

    init_otel_tracing(
        &config.service_name,
        &config.otel_filters,
        config.otel_endpoint.as_deref(),
    )?;
    tracing::info!(%path, "Loaded config");

    let source = SqlBackend::try_from_config(&config.source).await?;
    let destination = DocumentStore::try_from_config(&config.destination).await?;
    let page_size = args.page_size.unwrap_or(config.page_size);
    let migrator = Migrator::new(source.pool().clone(), destination, page_size);

    match migrator.run().await {
        Ok(report) => {
            tracing::info!(
                clusters = report.clusters,
                instances = report.instances,
                "Migration complete"
            );
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "Migration aborted, rerun to resume");
            Err(err.into())
        }
    }
}
