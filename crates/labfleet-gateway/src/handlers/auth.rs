//! Registration and login endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use labfleet_control::{ControlPlane, RegisterRequest};
use labfleet_core::{Role, UserId};

use crate::error::ApiError;
use crate::state::GatewayState;

/// Response for a successful registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// Acknowledgment message.
    pub msg: &'static str,
    /// The new user's id.
    pub id: UserId,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginBody {
    /// Email address.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

/// Response for a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub access_token: String,
    /// The user's role, for client-side routing.
    pub role: Role,
}

/// Create a user account.
///
/// # Errors
///
/// Returns 409 for duplicate emails and 400 for malformed input.
pub async fn register<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let user = state.control.register_user(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            msg: "registered",
            id: user.id,
        }),
    ))
}

/// Issue a bearer token for valid credentials.
///
/// # Errors
///
/// Returns 401 on bad credentials and 403 for disabled accounts.
pub async fn login<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Json(body): Json<LoginBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let user = state.control.login(&body.email, &body.password).await?;

    let access_token = state
        .tokens
        .issue(user.id, user.role, &user.email)
        .map_err(|e| {
            tracing::error!(error = %e, "Token issuing failed");
            ApiError::Internal("internal error".into())
        })?;

    Ok(Json(LoginResponse {
        access_token,
        role: user.role,
    }))
}

/// Stateless logout acknowledgment. Tokens expire on their own.
pub async fn logout() -> impl IntoResponse {
    Json(serde_json::json!({ "msg": "logged out" }))
}
