//! Persistence for identities, roles, permissions and the interface registry.
//!
//! Every backend implements [`CredentialStore`] (consumed by the access-control
//! core) plus the repository traits used by the CRUD handlers. Grant mutations
//! go through [`RoleRepository`] so callers can invalidate cached grants.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labtrack_auth::{CredentialStore, Permission, RoleGrants, RoleName, StoreResult};
use labtrack_core::{DomainError, Email, InterfaceId, LocationId, Matricule, PermissionId, RoleId, UserId};

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// Stored user account.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub matricule: Matricule,
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl core::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("matricule", &self.matricule)
            .field("email", &self.email)
            .field("role_id", &self.role_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub matricule: Matricule,
    pub email: Email,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role_id: RoleId,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub matricule: Option<Matricule>,
    pub email: Option<Email>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub role_id: Option<RoleId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRecord {
    pub id: PermissionId,
    pub name: Permission,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: RoleName,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub id: LocationId,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
}

/// Lifecycle state of a tracked interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum InterfaceStatus {
    #[default]
    InStock,
    InUse,
    UnderMaintenance,
    Retired,
}

impl InterfaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceStatus::InStock => "InStock",
            InterfaceStatus::InUse => "InUse",
            InterfaceStatus::UnderMaintenance => "UnderMaintenance",
            InterfaceStatus::Retired => "Retired",
        }
    }
}

impl core::str::FromStr for InterfaceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "InStock" => Ok(InterfaceStatus::InStock),
            "InUse" => Ok(InterfaceStatus::InUse),
            "UnderMaintenance" => Ok(InterfaceStatus::UnderMaintenance),
            "Retired" => Ok(InterfaceStatus::Retired),
            other => Err(DomainError::validation(format!(
                "unknown interface status '{other}' (expected InStock, InUse, UnderMaintenance or Retired)"
            ))),
        }
    }
}

/// A tracked test interface (asset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceRecord {
    pub id: InterfaceId,
    pub serial_number: String,
    pub name: String,
    pub model: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: InterfaceStatus,
    pub acquisition_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub current_location_id: LocationId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInterface {
    pub serial_number: String,
    pub name: String,
    pub model: Option<String>,
    pub kind: Option<String>,
    pub status: InterfaceStatus,
    pub acquisition_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub current_location_id: LocationId,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct InterfaceChanges {
    pub serial_number: Option<String>,
    pub name: Option<String>,
    pub model: Option<String>,
    pub kind: Option<String>,
    pub status: Option<InterfaceStatus>,
    pub acquisition_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub current_location_id: Option<LocationId>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository contracts
// ─────────────────────────────────────────────────────────────────────────────

/// User accounts.
///
/// `create_user`/`update_user` fail with `StoreError::Conflict` on a taken
/// email or matricule and `StoreError::NotFound` on an unknown role.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>>;
    async fn get_user(&self, id: UserId) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_email(&self, email: &Email) -> StoreResult<Option<UserRecord>>;
    async fn create_user(&self, new: NewUser) -> StoreResult<UserRecord>;
    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<UserRecord>;
    async fn delete_user(&self, id: UserId) -> StoreResult<()>;
}

/// Roles, permissions and the grant relation between them.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn list_roles(&self) -> StoreResult<Vec<RoleGrants>>;
    async fn get_role(&self, id: RoleId) -> StoreResult<Option<RoleRecord>>;
    async fn list_permissions(&self) -> StoreResult<Vec<PermissionRecord>>;

    /// Idempotent: returns the existing permission when the name is taken.
    async fn ensure_permission(&self, name: Permission, description: Option<String>) -> StoreResult<PermissionRecord>;

    /// Idempotent: returns the existing role when the name is taken.
    async fn ensure_role(&self, name: RoleName, description: Option<String>) -> StoreResult<RoleRecord>;

    /// Add `permission` to the role's grants; granting twice is a no-op.
    async fn grant_permission(&self, role_id: RoleId, permission: &Permission) -> StoreResult<RoleGrants>;

    /// Remove `permission` from the role's grants; revoking an absent grant is a no-op.
    async fn revoke_permission(&self, role_id: RoleId, permission: &Permission) -> StoreResult<RoleGrants>;
}

/// Interfaces and the locations they sit in.
#[async_trait]
pub trait InterfaceRepository: Send + Sync {
    async fn list_interfaces(&self) -> StoreResult<Vec<InterfaceRecord>>;
    async fn get_interface(&self, id: InterfaceId) -> StoreResult<Option<InterfaceRecord>>;
    async fn find_interface_by_serial(&self, serial_number: &str) -> StoreResult<Option<InterfaceRecord>>;
    async fn create_interface(&self, new: NewInterface) -> StoreResult<InterfaceRecord>;
    async fn update_interface(&self, id: InterfaceId, changes: InterfaceChanges) -> StoreResult<InterfaceRecord>;
    async fn delete_interface(&self, id: InterfaceId) -> StoreResult<()>;

    async fn list_locations(&self) -> StoreResult<Vec<LocationRecord>>;
    async fn get_location(&self, id: LocationId) -> StoreResult<Option<LocationRecord>>;

    /// Idempotent: returns the existing location when the name is taken.
    async fn ensure_location(
        &self,
        name: String,
        description: Option<String>,
        address: Option<String>,
    ) -> StoreResult<LocationRecord>;
}

/// Everything the API needs from a backend.
pub trait LabtrackStore: CredentialStore + UserRepository + RoleRepository + InterfaceRepository {}

impl<T> LabtrackStore for T where T: CredentialStore + UserRepository + RoleRepository + InterfaceRepository {}
