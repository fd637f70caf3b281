//! Credential store contract consumed by the issuer and the permission gate.
//!
//! Implementations live in `labtrack-infra`; this crate never talks to a
//! database directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use labtrack_core::{Email, Matricule, RoleId, UserId};

use crate::{PermissionSet, RoleName};

/// Identity record as needed for sign-in.
///
/// Carries the password hash, so it must never be serialized into a response;
/// use [`IdentitySummary`] for that.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredIdentity {
    pub id: UserId,
    pub email: Email,
    pub matricule: Matricule,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role_id: RoleId,
    pub role_name: RoleName,
}

impl core::fmt::Debug for StoredIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoredIdentity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("matricule", &self.matricule)
            .field("role_id", &self.role_id)
            .field("role_name", &self.role_name)
            .finish_non_exhaustive()
    }
}

/// Public identity summary returned on sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub id: UserId,
    pub matricule: Matricule,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub role: RoleName,
}

impl From<&StoredIdentity> for IdentitySummary {
    fn from(identity: &StoredIdentity) -> Self {
        Self {
            id: identity.id,
            matricule: identity.matricule.clone(),
            email: identity.email.clone(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            role: identity.role_name.clone(),
        }
    }
}

/// A role together with the permission names currently granted to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrants {
    pub role_id: RoleId,
    pub role_name: RoleName,
    pub permissions: PermissionSet,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an identity by its (normalised) login handle.
    async fn find_identity_by_login_handle(&self, handle: &str) -> StoreResult<Option<StoredIdentity>>;

    /// Load a role and its granted permission names.
    async fn find_role_with_permissions(&self, role_id: RoleId) -> StoreResult<Option<RoleGrants>>;
}

#[async_trait]
impl<S> CredentialStore for Arc<S>
where
    S: CredentialStore + ?Sized,
{
    async fn find_identity_by_login_handle(&self, handle: &str) -> StoreResult<Option<StoredIdentity>> {
        (**self).find_identity_by_login_handle(handle).await
    }

    async fn find_role_with_permissions(&self, role_id: RoleId) -> StoreResult<Option<RoleGrants>> {
        (**self).find_role_with_permissions(role_id).await
    }
}
