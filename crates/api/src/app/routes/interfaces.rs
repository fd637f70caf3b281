use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};

use labtrack_auth::permissions::{MANAGE_INTERFACES, READ_INTERFACES};
use labtrack_auth::{RoleName, require_roles};
use labtrack_core::{InterfaceId, LocationId};
use labtrack_infra::store::{InterfaceChanges, InterfaceStatus, NewInterface};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::authz;

pub fn router(services: &Arc<AppServices>) -> Router {
    let manage = || require_roles([RoleName::ADMIN]).with_permissions([MANAGE_INTERFACES]);
    let read = || require_roles(RoleName::builtin()).with_permissions([READ_INTERFACES]);

    Router::new()
        .merge(authz::guard(
            Router::new().route("/", get(list_interfaces)),
            services,
            read(),
        ))
        .merge(authz::guard(
            Router::new().route("/:id", get(get_interface)),
            services,
            read(),
        ))
        .merge(authz::guard(
            Router::new().route("/", post(create_interface)),
            services,
            manage(),
        ))
        .merge(authz::guard(
            Router::new().route("/:id", put(update_interface)),
            services,
            manage(),
        ))
        .merge(authz::guard(
            Router::new().route("/:id", delete(delete_interface)),
            services,
            manage(),
        ))
}

fn parse_interface_id(raw: &str) -> Result<InterfaceId, Response> {
    raw.parse().map_err(|_| errors::bad_request("invalid interface id"))
}

fn parse_location_id(raw: &str) -> Result<LocationId, Response> {
    raw.parse().map_err(|_| errors::bad_request("invalid location id"))
}

fn parse_status(raw: &str) -> Result<InterfaceStatus, Response> {
    InterfaceStatus::from_str(raw).map_err(|e| errors::bad_request(e.to_string()))
}

async fn ensure_location_exists(services: &AppServices, id: LocationId) -> Result<(), Response> {
    services
        .store
        .get_location(id)
        .await
        .map_err(errors::store_error_to_response)?
        .map(|_| ())
        .ok_or_else(|| errors::not_found("Location not found."))
}

pub async fn list_interfaces(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, Response> {
    let interfaces = services
        .store
        .list_interfaces()
        .await
        .map_err(errors::store_error_to_response)?;
    Ok((StatusCode::OK, Json(interfaces)).into_response())
}

pub async fn get_interface(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    let id = parse_interface_id(&id)?;
    let interface = services
        .store
        .get_interface(id)
        .await
        .map_err(errors::store_error_to_response)?
        .ok_or_else(|| errors::not_found("Interface not found."))?;
    Ok((StatusCode::OK, Json(interface)).into_response())
}

pub async fn create_interface(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateInterfaceRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(body) = body.map_err(|e| errors::bad_request(e.body_text()))?;

    let (Some(serial_number), Some(name), Some(location)) = (
        dto::non_blank(body.serial_number),
        dto::non_blank(body.name),
        dto::non_blank(body.current_location_id),
    ) else {
        return Err(errors::bad_request(
            "Serial number, name and current location are required.",
        ));
    };

    let current_location_id = parse_location_id(&location)?;
    ensure_location_exists(&services, current_location_id).await?;
    let status = dto::non_blank(body.status)
        .map(|s| parse_status(&s))
        .transpose()?
        .unwrap_or_default();

    let interface = services
        .store
        .create_interface(NewInterface {
            serial_number,
            name,
            model: dto::non_blank(body.model),
            kind: dto::non_blank(body.kind),
            status,
            acquisition_date: body.acquisition_date,
            notes: dto::non_blank(body.notes),
            current_location_id,
        })
        .await
        .map_err(errors::store_error_to_response)?;

    tracing::info!(interface_id = %interface.id, serial = %interface.serial_number, "interface created");
    Ok((StatusCode::CREATED, Json(interface)).into_response())
}

pub async fn update_interface(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateInterfaceRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let id = parse_interface_id(&id)?;
    let Json(body) = body.map_err(|e| errors::bad_request(e.body_text()))?;

    let current_location_id = dto::non_blank(body.current_location_id)
        .map(|l| parse_location_id(&l))
        .transpose()?;
    if let Some(location) = current_location_id {
        ensure_location_exists(&services, location).await?;
    }

    let changes = InterfaceChanges {
        serial_number: dto::non_blank(body.serial_number),
        name: dto::non_blank(body.name),
        model: dto::non_blank(body.model),
        kind: dto::non_blank(body.kind),
        status: dto::non_blank(body.status).map(|s| parse_status(&s)).transpose()?,
        acquisition_date: body.acquisition_date,
        notes: dto::non_blank(body.notes),
        current_location_id,
    };

    let interface = services
        .store
        .update_interface(id, changes)
        .await
        .map_err(errors::store_error_to_response)?;
    Ok((StatusCode::OK, Json(interface)).into_response())
}

pub async fn delete_interface(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    let id = parse_interface_id(&id)?;
    services
        .store
        .delete_interface(id)
        .await
        .map_err(errors::store_error_to_response)?;

    tracing::info!(interface_id = %id, "interface deleted");
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Interface deleted successfully." })),
    )
        .into_response())
}
