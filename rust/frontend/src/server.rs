use std::net::SocketAddr;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use discovery_storage::{Registration, StorageBackend};
use discovery_types::{Cluster, Instance};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::{ServerError, SourceIp};

const MAX_USER_AGENT_CHARS: usize = 1000;

#[derive(Clone)]
pub struct DiscoveryServer {
    url: String,
    backend: StorageBackend,
}

impl DiscoveryServer {
    /// `url` is the public base URL used in `Location` headers.
    pub fn new(url: String, backend: StorageBackend) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            backend,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/clusters", post(create_cluster))
            .route(
                "/clusters/{cluster_id}/instances",
                post(create_instance).get(get_instances),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(self.clone())
    }

    pub async fn run(self, port: u16) -> Result<(), std::io::Error> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
        tracing::info!(port, url = %self.url, "Listening");
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[derive(Serialize, Deserialize, Debug)]
struct InstancePayload {
    data: Instance,
}

#[derive(Serialize, Deserialize, Debug)]
struct InstancesPayload {
    data: Vec<Instance>,
}

async fn create_cluster(
    State(server): State<DiscoveryServer>,
    SourceIp(creator_ip): SourceIp,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServerError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let mut cluster = Cluster::new(
        creator_ip,
        user_agent
            .chars()
            .take(MAX_USER_AGENT_CHARS)
            .collect::<String>(),
    );
    server.backend.create_cluster(&mut cluster).await?;

    let location = format!("{}/clusters/{}", server.url, cluster.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]))
}

async fn create_instance(
    State(server): State<DiscoveryServer>,
    Path(cluster_id): Path<String>,
    SourceIp(creator_ip): SourceIp,
    Json(payload): Json<InstancePayload>,
) -> Result<impl IntoResponse, ServerError> {
    let mut instance = Instance {
        id: String::new(),
        cluster_id,
        creator_ip,
        created_at: None,
        ..payload.data
    };
    let status = match server.backend.create_instance(&mut instance).await? {
        Registration::Created => StatusCode::CREATED,
        Registration::Existing => StatusCode::CONFLICT,
    };

    let location = format!(
        "{}/clusters/{}/instances/{}",
        server.url, instance.cluster_id, instance.id
    );
    Ok((
        status,
        [(header::LOCATION, location)],
        Json(InstancePayload { data: instance }),
    ))
}

async fn get_instances(
    State(server): State<DiscoveryServer>,
    Path(cluster_id): Path<String>,
) -> Result<Json<InstancesPayload>, ServerError> {
    let instances = server.backend.get_cluster_instances(&cluster_id).await?;
    Ok(Json(InstancesPayload { data: instances }))
}
