use std::sync::Arc;

use axum::{routing::get, Router};

use crate::app::services::AppServices;

pub mod auth;
pub mod interfaces;
pub mod locations;
pub mod roles;
pub mod system;
pub mod users;

/// Router for all authenticated endpoints.
///
/// Each group carries its own role/permission guards; the authentication
/// layer is applied by the caller.
pub fn router(services: &Arc<AppServices>) -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .merge(auth::session_router())
        .nest("/users", users::router(services))
        .nest("/interfaces", interfaces::router(services))
        .nest("/locations", locations::router(services))
        .nest("/roles", roles::router(services))
}
