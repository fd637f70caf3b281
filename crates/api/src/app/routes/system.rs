use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use labtrack_auth::IdentityContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Echo the verified identity back to the caller.
pub async fn whoami(Extension(identity): Extension<IdentityContext>) -> impl IntoResponse {
    Json(identity)
}
