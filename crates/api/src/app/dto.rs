use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labtrack_auth::{RoleGrants, RoleName};
use labtrack_core::{Email, Matricule, RoleId, UserId};
use labtrack_infra::store::{PermissionRecord, UserRecord};

// -------------------------
// Request DTOs
// -------------------------

/// Sign-in body. `email`/`password` are accepted as aliases.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    #[serde(alias = "email")]
    pub login_handle: Option<String>,
    #[serde(alias = "password")]
    pub secret: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub matricule: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub role_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub matricule: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub role_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInterfaceRequest {
    pub serial_number: Option<String>,
    pub name: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub acquisition_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub current_location_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInterfaceRequest {
    pub serial_number: Option<String>,
    pub name: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub acquisition_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub current_location_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrantPermissionRequest {
    pub permission: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: RoleName,
}

/// User as returned by the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub matricule: Matricule,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: RoleRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn from_record(user: UserRecord, role_name: RoleName) -> Self {
        Self {
            id: user.id,
            matricule: user.matricule,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            role: RoleRef {
                id: user.role_id,
                name: role_name,
            },
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Resolve a user's role name from an already-loaded role list.
pub fn role_name_of(roles: &[RoleGrants], role_id: RoleId) -> RoleName {
    roles
        .iter()
        .find(|r| r.role_id == role_id)
        .map(|r| r.role_name.clone())
        .unwrap_or_else(|| RoleName::new("unknown"))
}

pub fn permission_to_json(record: &PermissionRecord) -> serde_json::Value {
    serde_json::json!({
        "id": record.id.to_string(),
        "name": record.name.as_str(),
        "description": record.description,
    })
}

/// Treat blank strings as absent, the way form-backed clients send them.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
