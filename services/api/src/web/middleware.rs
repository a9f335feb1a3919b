//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{error, warn};
use tutor_core::ports::PortError;

use crate::web::state::AppState;

/// The username resolved from the session cookie, inserted into request extensions.
#[derive(Clone, Debug)]
pub struct AuthUser(pub String);

/// Pulls the `session` cookie value out of the request headers.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .filter(|id| !id.is_empty())
}

/// Middleware that validates the auth session cookie and extracts the username.
///
/// If valid, inserts an `AuthUser` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_session_id = session_cookie(req.headers())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let username = state
        .users
        .resolve_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            match e {
                PortError::Unauthorized => warn!("Rejected unknown auth session"),
                other => error!("Failed to validate auth session: {:?}", other),
            }
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(AuthUser(username));
    Ok(next.run(req).await)
}
