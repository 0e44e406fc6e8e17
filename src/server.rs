//! HTTP Endpoint Module
//!
//! Serves the lookup over HTTP. Any method is accepted on `/` and `/v1/`.
//! The response is the JSON location (or `null`) with a `text/html` content
//! type kept for existing clients; a rejected caller gets an empty 404.
use crate::error::GeoError;
use crate::service::GeoService;
use anyhow::{Context, Result};
use axum::extract::{ConnectInfo, State};
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub const CONTENT_TYPE_VALUE: &str = "text/html; charset=UTF-8";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GeoService>,
    /// Lowercase header name carrying the client address chain, if trusted.
    pub forwarded_header: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", any(locate_handler))
        .route("/v1", any(locate_handler))
        .route("/v1/", any(locate_handler))
        .with_state(state)
}

/// Binds `addr` and serves until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    serve_on(listener, state).await
}

/// Serves on an already bound listener.
pub async fn serve_on(listener: TcpListener, state: AppState) -> Result<()> {
    let local = listener.local_addr()?;
    log::info!("Listening on http://{}/", local);
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;
    Ok(())
}

/// The forwarded header when configured and present, else the peer address.
pub fn client_address(headers: &HeaderMap, peer: &SocketAddr, forwarded_header: Option<&str>) -> String {
    forwarded_header
        .and_then(|name| headers.get(name))
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

async fn locate_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let address = client_address(&headers, &peer, state.forwarded_header.as_deref());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    match state.service.locate(&address, user_agent).await {
        Ok(location) => match serde_json::to_string(&location) {
            Ok(body) => (
                [(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_VALUE))],
                body,
            )
                .into_response(),
            Err(e) => {
                log::error!("Failed to encode location: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(GeoError::AccessDenied) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            log::warn!("Lookup for {} failed: {}", address, e);
            (
                [(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_VALUE))],
                "null",
            )
                .into_response()
        }
    }
}
