//! PETSI Gateway - HTTP front door for the PETSI veterinary dashboard.
//!
//! This crate relays browser requests to the n8n webhook backend:
//! - Drive folder and file management
//! - Products and appointments (citas)
//! - Chatbot relay with cookie-tracked conversation sessions
//! - Username/password login issuing JWT bearer tokens
//!
//! ## Architecture
//!
//! ```text
//! Browser → Gateway (trace → validate → session) → n8n webhooks
//!                          ↓
//!                  {"detail": ...} on failure
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod auth;
pub mod chatbot;
pub mod error;
pub mod form;
pub mod routes;
pub mod session;
pub mod upstream;
pub mod user;

pub use auth::{AuthState, AuthUser, Claims};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use routes::AppState;
pub use session::{Session, SessionStore};
pub use upstream::{Endpoint, UpstreamClient, UpstreamRequest};
pub use user::{User, UserStore, UserSummary};

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use petsi_common::config::Config;
use tower_http::cors::{Any, CorsLayer};

/// Build the CORS layer.
///
/// With no configured origins any origin is allowed without credentials;
/// otherwise only the listed origins, with credentials so the session
/// cookie travels.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Build the gateway router with all routes and middleware.
pub fn build_router(config: &Config) -> anyhow::Result<Router> {
    Ok(routes::build_all_routes(config)?.layer(cors_layer(&config.gateway.cors_origins)))
}

/// Start the gateway server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let router = build_router(config)?;

    tracing::info!(
        upstream = %config.upstream.base_url,
        "Starting PETSI Gateway on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
