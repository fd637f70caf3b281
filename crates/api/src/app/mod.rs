//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store backend, issuer/verifier, permission resolver, revocations
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use labtrack_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

const REVOCATION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Build the full HTTP router for already wired services.
pub fn build_router(services: Arc<AppServices>) -> Router {
    let public = routes::auth::public_router().layer(Extension(services.clone()));

    // Protected routes: authentication first, then per-route guards.
    let protected = routes::router(&services).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                services.clone(),
                middleware::auth_middleware,
            ))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api", public.merge(protected))
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Must be called from within a Tokio runtime: it starts the revocation
/// sweeper in the background.
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    services::spawn_revocation_sweeper(services.clone(), REVOCATION_SWEEP_INTERVAL);
    Ok(build_router(services))
}
