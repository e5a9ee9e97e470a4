use discovery_frontend::discovery_service_entrypoint;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    discovery_service_entrypoint().await
}
