use chrono::{DateTime, Utc};
use serde::Serialize;

use labtrack_core::{RoleId, UserId};

use crate::{RoleName, SessionClaims};

/// Verified, request-scoped identity reconstructed from a session token.
///
/// Immutable for the lifetime of the request; downstream guards and
/// handlers only ever read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityContext {
    identity_id: UserId,
    role_id: RoleId,
    role_name: RoleName,
    issued_at: DateTime<Utc>,
}

impl IdentityContext {
    pub fn new(identity_id: UserId, role_id: RoleId, role_name: RoleName, issued_at: DateTime<Utc>) -> Self {
        Self {
            identity_id,
            role_id,
            role_name,
            issued_at,
        }
    }

    pub fn identity_id(&self) -> UserId {
        self.identity_id
    }

    pub fn role_id(&self) -> RoleId {
        self.role_id
    }

    pub fn role_name(&self) -> &RoleName {
        &self.role_name
    }

    /// When the session backing this context was issued.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn is_admin(&self) -> bool {
        self.role_name.is_admin()
    }
}

impl From<SessionClaims> for IdentityContext {
    fn from(claims: SessionClaims) -> Self {
        Self {
            identity_id: claims.identity_id,
            role_id: claims.role_id,
            role_name: claims.role_name,
            issued_at: claims.issued_at,
        }
    }
}
