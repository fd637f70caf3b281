use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

use labtrack_auth::permissions::MANAGE_ROLES_PERMISSIONS;
use labtrack_auth::{IdentityContext, Permission, RoleName, require_roles};
use labtrack_core::RoleId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;

/// Role and permission administration. Admin only.
pub fn router(services: &Arc<AppServices>) -> Router {
    let routes = Router::new()
        .route("/", get(list_roles))
        .route("/permissions", get(list_permissions))
        .route("/:id/permissions", post(grant_permission))
        .route("/:id/permissions/:permission", delete(revoke_permission));

    authz::guard(
        routes,
        services,
        require_roles([RoleName::ADMIN]).with_permissions([MANAGE_ROLES_PERMISSIONS]),
    )
}

fn parse_role_id(raw: &str) -> Result<RoleId, Response> {
    raw.parse().map_err(|_| errors::bad_request("invalid role id"))
}

pub async fn list_roles(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, Response> {
    let roles = services.store.list_roles().await.map_err(errors::store_error_to_response)?;
    Ok((StatusCode::OK, Json(roles)).into_response())
}

pub async fn list_permissions(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, Response> {
    let permissions = services
        .store
        .list_permissions()
        .await
        .map_err(errors::store_error_to_response)?;
    let body: Vec<serde_json::Value> = permissions.iter().map(dto::permission_to_json).collect();
    Ok((StatusCode::OK, Json(body)).into_response())
}

pub async fn grant_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::GrantPermissionRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let role_id = parse_role_id(&id)?;
    let Json(body) = body.map_err(|e| errors::bad_request(e.body_text()))?;
    let permission = body.permission.trim().to_string();
    if permission.is_empty() {
        return Err(errors::bad_request("permission is required"));
    }
    let permission = Permission::new(permission);

    let grants = services
        .store
        .grant_permission(role_id, &permission)
        .await
        .map_err(errors::store_error_to_response)?;
    services.resolver.invalidate(role_id);

    tracing::info!(role_id = %role_id, permission = %permission, granted_by = %identity.identity_id(), "permission granted");
    Ok((StatusCode::OK, Json(grants)).into_response())
}

pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path((id, permission)): Path<(String, String)>,
) -> Result<Response, Response> {
    let role_id = parse_role_id(&id)?;
    let permission = Permission::new(permission);

    let grants = services
        .store
        .revoke_permission(role_id, &permission)
        .await
        .map_err(errors::store_error_to_response)?;
    services.resolver.invalidate(role_id);

    tracing::info!(role_id = %role_id, permission = %permission, revoked_by = %identity.identity_id(), "permission revoked");
    Ok((StatusCode::OK, Json(grants)).into_response())
}
