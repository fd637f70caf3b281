//! Route-level authorization guards.
//!
//! A [`Requirement`] is attached to a group of routes with [`guard`]; the
//! requirement's gates run after authentication and before the handler.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use labtrack_auth::{AuthError, Decision, IdentityContext, Requirement, UnauthenticatedReason};

use crate::app::errors;
use crate::app::services::AppServices;

#[derive(Clone)]
struct GuardState {
    services: Arc<AppServices>,
    requirement: Arc<Requirement>,
}

/// Protect every route in `routes` with `requirement`.
///
/// Must sit inside the authentication layer so an [`IdentityContext`] is
/// already attached to the request.
pub fn guard(routes: Router, services: &Arc<AppServices>, requirement: Requirement) -> Router {
    let state = GuardState {
        services: services.clone(),
        requirement: Arc::new(requirement),
    };
    routes.route_layer(axum::middleware::from_fn_with_state(state, enforce))
}

async fn enforce(State(guard): State<GuardState>, req: Request, next: Next) -> Response {
    let Some(context) = req.extensions().get::<IdentityContext>().cloned() else {
        return errors::auth_error_to_response(&AuthError::Unauthenticated(UnauthenticatedReason::Malformed));
    };

    match guard.services.resolver.authorize(&context, &guard.requirement).await {
        Ok(Decision::Allow) => next.run(req).await,
        Ok(Decision::Deny(reason)) => errors::auth_error_to_response(&AuthError::Forbidden(reason)),
        Err(e) => errors::auth_error_to_response(&e),
    }
}

/// Run a self-protection precondition inside a handler.
pub fn check(decision: Decision) -> Result<(), Response> {
    decision
        .into_result()
        .map_err(|e| errors::auth_error_to_response(&e))
}
