use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use labtrack_auth::{AuthError, IdentityContext, UnauthenticatedReason, extract_bearer};

use crate::app::errors;
use crate::app::services::AppServices;

/// Authenticate the request and attach its [`IdentityContext`].
///
/// Signature and expiry are checked first; the revocation list is consulted
/// only for otherwise valid tokens.
pub async fn auth_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let now = Utc::now();

    let context = match authenticate(&services, req.headers(), now) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::warn!(error = %e, path = %req.uri().path(), "authentication failed");
            return errors::auth_error_to_response(&e);
        }
    };

    req.extensions_mut().insert(context);
    next.run(req).await
}

fn authenticate(
    services: &AppServices,
    headers: &HeaderMap,
    now: chrono::DateTime<Utc>,
) -> Result<IdentityContext, AuthError> {
    let header = match headers.get(AUTHORIZATION) {
        // Non-ASCII header values can never be a well-formed bearer token.
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AuthError::Unauthenticated(UnauthenticatedReason::Malformed))?,
        ),
        None => None,
    };

    let token = extract_bearer(header)?;
    let context = services.verifier.verify_token(token, now)?;

    if services.revocations.is_revoked(&context, token, now) {
        return Err(AuthError::Unauthenticated(UnauthenticatedReason::Revoked));
    }
    Ok(context)
}
