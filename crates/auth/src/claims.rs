use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use labtrack_core::{RoleId, UserId};

use crate::RoleName;

/// Session token claim set.
///
/// Serialized with exactly these five fields; timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub identity_id: UserId,
    pub role_id: RoleId,
    pub role_name: RoleName,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl SessionClaims {
    /// Build claims valid for `ttl` from `now` (truncated to whole seconds,
    /// the precision of the wire format).
    pub fn new(
        identity_id: UserId,
        role_id: RoleId,
        role_name: RoleName,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        let issued_at = now.trunc_subsecs(0);
        Self {
            identity_id,
            role_id,
            role_name,
            issued_at,
            expires_at: issued_at + ttl,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate the time window of already-verified claims.
///
/// Signature verification happens in [`crate::token::TokenCodec`]; this only
/// checks `issued_at <= now < expires_at`.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_at(now: DateTime<Utc>) -> SessionClaims {
        SessionClaims::new(UserId::new(), RoleId::new(), RoleName::USER, now, Duration::hours(1))
    }

    #[test]
    fn serializes_with_camel_case_field_names_only() {
        let claims = claims_at(Utc::now());
        let value = serde_json::to_value(&claims).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["expiresAt", "identityId", "issuedAt", "roleId", "roleName"]);
        assert!(value["issuedAt"].is_i64());
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let claims = claims_at(now);
        assert!(validate_claims(&claims, claims.issued_at).is_ok());
        assert!(validate_claims(&claims, claims.expires_at - Duration::seconds(1)).is_ok());
        assert_eq!(
            validate_claims(&claims, claims.expires_at),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn future_issued_at_is_rejected() {
        let claims = claims_at(Utc::now());
        assert_eq!(
            validate_claims(&claims, claims.issued_at - Duration::seconds(5)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut claims = claims_at(Utc::now());
        claims.expires_at = claims.issued_at;
        assert_eq!(
            validate_claims(&claims, claims.issued_at),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
