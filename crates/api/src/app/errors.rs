use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use labtrack_auth::{AuthError, DenyReason, StoreError, UnauthenticatedReason};

/// Error body shared by every endpoint: `{ "status": ..., "message": ... }`.
pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "status": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Map an access-control failure to its external category.
///
/// Authentication sub-causes collapse into one 401 category and denials
/// never name the role or permission that was missing.
pub fn auth_error_to_response(err: &AuthError) -> axum::response::Response {
    match err {
        AuthError::MissingInput => json_error(
            StatusCode::BAD_REQUEST,
            "bad_request",
            "Login handle and secret are required.",
        ),
        AuthError::InvalidCredentials => {
            json_error(StatusCode::UNAUTHORIZED, "auth_failed", "Invalid credentials.")
        }
        AuthError::Unauthenticated(UnauthenticatedReason::Malformed) => json_error(
            StatusCode::UNAUTHORIZED,
            "auth_failed",
            "Authentication failed: No token provided or malformed.",
        ),
        AuthError::Unauthenticated(_) => json_error(
            StatusCode::UNAUTHORIZED,
            "auth_failed",
            "Authentication failed: Invalid token.",
        ),
        AuthError::Forbidden(reason) => json_error(StatusCode::FORBIDDEN, "forbidden", deny_message(*reason)),
        AuthError::Internal(detail) => {
            tracing::error!(error = %detail, "request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "error", "Internal server error.")
        }
    }
}

fn deny_message(reason: DenyReason) -> &'static str {
    match reason {
        DenyReason::RoleNotPermitted | DenyReason::RoleNotFound | DenyReason::MissingPermission => {
            "Access denied: insufficient privileges."
        }
        DenyReason::SelfDeletion => "Access denied: you cannot delete your own account.",
        DenyReason::SelfRoleChange => "Access denied: you cannot change your own role.",
        DenyReason::NotOwner => "Access denied: you can only access your own profile.",
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Unavailable(detail) => {
            tracing::error!(error = %detail, "store unavailable");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "error", "Internal server error.")
        }
    }
}

pub fn internal_error(detail: impl core::fmt::Display) -> axum::response::Response {
    tracing::error!(error = %detail, "request failed");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "error", "Internal server error.")
}

pub fn bad_request(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

pub fn not_found(message: impl Into<String>) -> axum::response::Response {
    json_error(StatusCode::NOT_FOUND, "not_found", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_causes_share_one_category() {
        for reason in [
            UnauthenticatedReason::Malformed,
            UnauthenticatedReason::InvalidToken,
            UnauthenticatedReason::Expired,
            UnauthenticatedReason::Revoked,
        ] {
            let res = auth_error_to_response(&AuthError::Unauthenticated(reason));
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(
            auth_error_to_response(&AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn denials_and_faults_map_to_403_and_500() {
        assert_eq!(
            auth_error_to_response(&AuthError::Forbidden(DenyReason::MissingPermission)).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            auth_error_to_response(&AuthError::internal("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            store_error_to_response(StoreError::Conflict("dup".into())).status(),
            StatusCode::CONFLICT
        );
    }
}
