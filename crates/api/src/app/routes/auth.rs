use std::sync::Arc;

use axum::{
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use labtrack_auth::{IdentityContext, extract_bearer};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

/// Public routes: no session required.
pub fn public_router() -> Router {
    Router::new().route("/auth/sign-in", post(sign_in))
}

/// Routes for an already authenticated caller.
pub fn session_router() -> Router {
    Router::new().route("/auth/sign-out", post(sign_out))
}

pub async fn sign_in(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::SignInRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::bad_request(e.body_text()),
    };

    let login_handle = body.login_handle.unwrap_or_default();
    let secret = body.secret.unwrap_or_default();

    match services.issuer.issue(&login_handle, &secret, Utc::now()).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => errors::auth_error_to_response(&e),
    }
}

/// Revoke every session the caller currently holds, including this one.
pub async fn sign_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(identity): Extension<IdentityContext>,
    headers: HeaderMap,
) -> axum::response::Response {
    let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    match extract_bearer(header) {
        Ok(token) => {
            services.end_session(identity.identity_id(), token);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::auth_error_to_response(&e),
    }
}
