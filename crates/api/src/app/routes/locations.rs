use std::sync::Arc;

use axum::{
    extract::Extension,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use labtrack_auth::permissions::READ_INTERFACES;
use labtrack_auth::{RoleName, require_roles};

use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;

/// Locations are read alongside interfaces, so they share its permission.
pub fn router(services: &Arc<AppServices>) -> Router {
    authz::guard(
        Router::new().route("/", get(list_locations)),
        services,
        require_roles(RoleName::builtin()).with_permissions([READ_INTERFACES]),
    )
}

pub async fn list_locations(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, Response> {
    let locations = services
        .store
        .list_locations()
        .await
        .map_err(errors::store_error_to_response)?;
    Ok(Json(locations).into_response())
}
