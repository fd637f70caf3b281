//! Per-request session verification. Pure: no store access.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    AuthError, IdentityContext, TokenCodec, TokenValidationError, UnauthenticatedReason,
    validate_claims,
};

pub struct CredentialVerifier {
    codec: Arc<TokenCodec>,
}

impl CredentialVerifier {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Verify a raw `Authorization` header value.
    pub fn verify(&self, authorization: Option<&str>, now: DateTime<Utc>) -> Result<IdentityContext, AuthError> {
        let token = extract_bearer(authorization)?;
        self.verify_token(token, now)
    }

    pub fn verify_token(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityContext, AuthError> {
        let claims = self.codec.decode(token).map_err(|e| {
            tracing::debug!(error = %e, "session token rejected");
            AuthError::Unauthenticated(UnauthenticatedReason::InvalidToken)
        })?;

        validate_claims(&claims, now).map_err(|e| {
            let reason = match e {
                TokenValidationError::Expired => UnauthenticatedReason::Expired,
                TokenValidationError::NotYetValid | TokenValidationError::InvalidTimeWindow => {
                    UnauthenticatedReason::InvalidToken
                }
            };
            AuthError::Unauthenticated(reason)
        })?;

        Ok(claims.into())
    }
}

/// Extract the token from a header of the exact form `Bearer <token>`.
pub fn extract_bearer(authorization: Option<&str>) -> Result<&str, AuthError> {
    let malformed = AuthError::Unauthenticated(UnauthenticatedReason::Malformed);

    let token = authorization
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(malformed.clone())?;

    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(malformed);
    }
    Ok(token)
}
