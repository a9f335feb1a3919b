//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    auth::{self, AuthResponse, CredentialsRequest},
    middleware::AuthUser,
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        profile_handler,
    ),
    components(
        schemas(CredentialsRequest, AuthResponse, ProfileResponse)
    ),
    tags(
        (name = "Course Tutor API", description = "Authentication and profile endpoints. Chat runs over the /ws WebSocket.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The logged-in user's stored profile.
#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    username: String,
    email: String,
    role: String,
    learning_style: Option<String>,
    created_at: DateTime<Utc>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Fetch the profile of the user behind the session cookie.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "The current user's profile", body = ProfileResponse),
        (status = 401, description = "Not logged in"),
        (status = 404, description = "The session's user no longer exists"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(AuthUser(username)): Extension<AuthUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state.tutor.accounts().get(&username).await {
        Ok(Some(user)) => Ok(Json(ProfileResponse {
            role: user.role.as_str().to_string(),
            learning_style: user.learning_style.map(|s| s.as_str().to_string()),
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        })),
        Ok(None) => Err((StatusCode::NOT_FOUND, "User not found".to_string())),
        Err(e) => {
            error!("Failed to load profile for {}: {:?}", username, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load profile".to_string(),
            ))
        }
    }
}
