//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user registration, login, and logout.
//! Register and login share one credential payload; the route decides the mode.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use tutor_core::domain::{AuthMode, Identity};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::{middleware::session_cookie, state::AppState};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub username: String,
    pub email: String,
    pub role: String,
}

impl From<Identity> for AuthResponse {
    fn from(identity: Identity) -> Self {
        Self {
            username: identity.username,
            email: identity.email,
            role: identity.role.as_str().to_string(),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new account and log in
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Registration rejected"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let identity = state
        .tutor
        .accounts()
        .authenticate_request(AuthMode::Register, &req.username, &req.password)
        .await
        .ok_or((StatusCode::BAD_REQUEST, "Registration failed".to_string()))?;
    open_auth_session(&state, identity, StatusCode::CREATED).await
}

/// POST /auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let identity = state
        .tutor
        .accounts()
        .authenticate_request(AuthMode::Login, &req.username, &req.password)
        .await
        .ok_or((StatusCode::UNAUTHORIZED, "Invalid username or password".to_string()))?;
    open_auth_session(&state, identity, StatusCode::OK).await
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id =
        session_cookie(&headers).ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .users
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
        })?;

    let cookie = "session=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

/// Stores a fresh auth session and returns it as a cookie. Sessions do not expire.
async fn open_auth_session(
    state: &AppState,
    identity: Identity,
    status: StatusCode,
) -> Result<(StatusCode, [(header::HeaderName, String); 1], Json<AuthResponse>), (StatusCode, String)> {
    let auth_session_id = Uuid::new_v4().to_string();
    state
        .users
        .create_auth_session(&auth_session_id, &identity.username)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
        })?;
    info!("Opened auth session for {}", identity.username);

    let cookie = format!("session={}; HttpOnly; SameSite=Lax; Path=/", auth_session_id);
    Ok((status, [(header::SET_COOKIE, cookie)], Json(AuthResponse::from(identity))))
}
