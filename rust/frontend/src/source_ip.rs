use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Address of the client that made the request.
///
/// This is the last hop of `X-Forwarded-For` when a proxy set one, otherwise
/// the peer address of the connection. Empty if neither is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIp(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SourceIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get(X_FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty());
        if let Some(forwarded) = forwarded {
            let last = forwarded.rsplit(',').next().unwrap_or_default();
            return Ok(SourceIp(last.trim().to_string()));
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default();
        Ok(SourceIp(peer))
    }
}
