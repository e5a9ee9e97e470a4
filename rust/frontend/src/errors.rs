use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use discovery_error::DiscoveryError;
use serde::Serialize;

/// Wrapper around `dyn DiscoveryError` that implements `IntoResponse`, so route handlers can return `Result<_, ServerError>` and use `?` on any of our errors.
#[derive(Debug)]
pub struct ServerError(Box<dyn DiscoveryError>);

impl<E: DiscoveryError + 'static> From<E> for ServerError {
    fn from(e: E) -> Self {
        ServerError(Box::new(e))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status_code = StatusCode::from(code);
        if status_code.is_server_error() && self.0.should_trace_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let error = ErrorResponse {
            error: code.name().to_string(),
            message: self.0.to_string(),
        };
        (status_code, Json(error)).into_response()
    }
}
