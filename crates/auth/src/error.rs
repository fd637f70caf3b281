//! Access-control error taxonomy.

use thiserror::Error;

use crate::{DenyReason, StoreError};

/// Why a presented credential did not authenticate.
///
/// All variants surface to clients as the same 401 category; the variant is
/// only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    /// Missing header or not of the form `Bearer <token>`.
    Malformed,
    /// Bad signature, wrong algorithm or undecodable payload.
    InvalidToken,
    /// `now >= expiresAt` (or a nonsensical time window).
    Expired,
    /// The identity's sessions were revoked after this token was issued.
    Revoked,
}

impl core::fmt::Display for UnauthenticatedReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            UnauthenticatedReason::Malformed => "malformed or missing token",
            UnauthenticatedReason::InvalidToken => "invalid token",
            UnauthenticatedReason::Expired => "token expired",
            UnauthenticatedReason::Revoked => "session revoked",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("login handle and secret are required")]
    MissingInput,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("authentication failed: {0}")]
    Unauthenticated(UnauthenticatedReason),

    #[error("access denied: {0}")]
    Forbidden(DenyReason),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<StoreError> for AuthError {
    fn from(value: StoreError) -> Self {
        Self::Internal(value.to_string())
    }
}
