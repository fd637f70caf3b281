use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};

use labtrack_auth::permissions::{MANAGE_USERS, READ_USERS};
use labtrack_auth::preconditions::{ensure_not_self_deletion, ensure_role_change_allowed, ensure_self_or_admin};
use labtrack_auth::{IdentityContext, RoleName, require_roles};
use labtrack_core::{Email, Matricule, RoleId, UserId};
use labtrack_infra::store::{NewUser, UserChanges, UserRecord};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;

pub fn router(services: &Arc<AppServices>) -> Router {
    let admin_only = || require_roles([RoleName::ADMIN]);
    let any_role = || require_roles(RoleName::builtin());

    Router::new()
        .merge(authz::guard(
            Router::new().route("/", get(list_users)),
            services,
            admin_only().with_permissions([READ_USERS]),
        ))
        .merge(authz::guard(
            Router::new().route("/", post(create_user)),
            services,
            admin_only().with_permissions([MANAGE_USERS]),
        ))
        .merge(authz::guard(
            Router::new().route("/:id", get(get_user)),
            services,
            any_role().with_permissions([READ_USERS]),
        ))
        .merge(authz::guard(
            Router::new().route("/:id", put(update_user)),
            services,
            any_role().with_permissions([MANAGE_USERS]),
        ))
        .merge(authz::guard(
            Router::new().route("/:id", delete(delete_user)),
            services,
            admin_only().with_permissions([MANAGE_USERS]),
        ))
}

fn parse_user_id(raw: &str) -> Result<UserId, Response> {
    raw.parse().map_err(|_| errors::bad_request("invalid user id"))
}

fn parse_role_id(raw: &str) -> Result<RoleId, Response> {
    raw.parse().map_err(|_| errors::bad_request("invalid role id"))
}

async fn user_response(services: &AppServices, user: UserRecord) -> Result<dto::UserResponse, Response> {
    let role = services
        .store
        .get_role(user.role_id)
        .await
        .map_err(errors::store_error_to_response)?;
    let role_name = role.map(|r| r.name).unwrap_or_else(|| RoleName::new("unknown"));
    Ok(dto::UserResponse::from_record(user, role_name))
}

pub async fn list_users(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, Response> {
    let roles = services.store.list_roles().await.map_err(errors::store_error_to_response)?;
    let users = services.store.list_users().await.map_err(errors::store_error_to_response)?;

    let users: Vec<dto::UserResponse> = users
        .into_iter()
        .map(|u| {
            let role_name = dto::role_name_of(&roles, u.role_id);
            dto::UserResponse::from_record(u, role_name)
        })
        .collect();
    Ok((StatusCode::OK, Json(users)).into_response())
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(body) = body.map_err(|e| errors::bad_request(e.body_text()))?;

    let (Some(matricule), Some(email), Some(password), Some(first_name), Some(last_name), Some(role_id)) = (
        dto::non_blank(body.matricule),
        dto::non_blank(body.email),
        body.password.filter(|p| !p.is_empty()),
        dto::non_blank(body.first_name),
        dto::non_blank(body.last_name),
        dto::non_blank(body.role_id),
    ) else {
        return Err(errors::bad_request("All fields are required to create a user account."));
    };

    let matricule = Matricule::parse(&matricule).map_err(|e| errors::bad_request(e.to_string()))?;
    let email = Email::parse(&email).map_err(|e| errors::bad_request(e.to_string()))?;
    let role_id = parse_role_id(&role_id)?;
    let password_hash = services
        .hash_secret(password)
        .await
        .map_err(errors::internal_error)?;

    let user = services
        .store
        .create_user(NewUser {
            matricule,
            email,
            password_hash,
            first_name,
            last_name,
            phone_number: dto::non_blank(body.phone_number),
            role_id,
        })
        .await
        .map_err(errors::store_error_to_response)?;

    tracing::info!(user_id = %user.id, "user created");
    let user = user_response(&services, user).await?;
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    let id = parse_user_id(&id)?;
    authz::check(ensure_self_or_admin(&identity, id))?;

    let user = services
        .store
        .get_user(id)
        .await
        .map_err(errors::store_error_to_response)?
        .ok_or_else(|| errors::not_found("User not found."))?;

    let user = user_response(&services, user).await?;
    Ok((StatusCode::OK, Json(user)).into_response())
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateUserRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let id = parse_user_id(&id)?;
    let Json(body) = body.map_err(|e| errors::bad_request(e.body_text()))?;
    authz::check(ensure_self_or_admin(&identity, id))?;

    let current = services
        .store
        .get_user(id)
        .await
        .map_err(errors::store_error_to_response)?
        .ok_or_else(|| errors::not_found("User not found for update."))?;

    let requested_role = dto::non_blank(body.role_id).map(|r| parse_role_id(&r)).transpose()?;
    authz::check(ensure_role_change_allowed(&identity, current.role_id, requested_role))?;

    let password_hash = match body.password.filter(|p| !p.is_empty()) {
        Some(p) => Some(
            services
                .hash_secret(p)
                .await
                .map_err(errors::internal_error)?,
        ),
        None => None,
    };

    let changes = UserChanges {
        matricule: dto::non_blank(body.matricule)
            .map(|m| Matricule::parse(&m))
            .transpose()
            .map_err(|e| errors::bad_request(e.to_string()))?,
        email: dto::non_blank(body.email)
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(|e| errors::bad_request(e.to_string()))?,
        password_hash,
        first_name: dto::non_blank(body.first_name),
        last_name: dto::non_blank(body.last_name),
        phone_number: dto::non_blank(body.phone_number),
        role_id: requested_role,
    };

    let updated = services
        .store
        .update_user(id, changes)
        .await
        .map_err(errors::store_error_to_response)?;

    if updated.role_id != current.role_id {
        // Outstanding tokens still carry the old role.
        services.revoke_sessions(updated.id);
    }

    let user = user_response(&services, updated).await?;
    Ok((StatusCode::OK, Json(user)).into_response())
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    let id = parse_user_id(&id)?;
    authz::check(ensure_not_self_deletion(&identity, id))?;

    services
        .store
        .delete_user(id)
        .await
        .map_err(errors::store_error_to_response)?;
    services.revoke_sessions(id);

    tracing::info!(user_id = %id, deleted_by = %identity.identity_id(), "user deleted");
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "User deleted successfully." })),
    )
        .into_response())
}
