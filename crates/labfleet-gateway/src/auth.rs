//! Authentication extractors and role gating.
//!
//! [`AuthUser`] validates the `Authorization: Bearer <token>` header and
//! exposes the token's claims. The [`Admin`] and [`Student`] wrappers admit
//! a request only when the claimed role matches; anything else is
//! forbidden. There is no default role.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use labfleet_control::ControlPlane;
use labfleet_core::{Role, UserId};

use crate::error::ApiError;
use crate::state::GatewayState;

/// An authenticated user extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The authenticated user's id.
    pub user_id: UserId,
    /// The role carried in the token.
    pub role: Role,
    /// The email carried in the token.
    pub email: String,
}

#[async_trait]
impl<C> FromRequestParts<Arc<GatewayState<C>>> for AuthUser
where
    C: ControlPlane + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C>>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected bearer token".into()))?;

        let claims = state
            .tokens
            .verify(token)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        Ok(Self {
            user_id: claims.user_id,
            role: claims.role,
            email: claims.email,
        })
    }
}

/// An authenticated user whose token carries the admin role.
#[derive(Debug, Clone)]
pub struct Admin(pub AuthUser);

#[async_trait]
impl<C> FromRequestParts<Arc<GatewayState<C>>> for Admin
where
    C: ControlPlane + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C>>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role == Role::Admin {
            Ok(Self(user))
        } else {
            Err(ApiError::Forbidden("admin role required".into()))
        }
    }
}

/// An authenticated user whose token carries the student role.
#[derive(Debug, Clone)]
pub struct Student(pub AuthUser);

#[async_trait]
impl<C> FromRequestParts<Arc<GatewayState<C>>> for Student
where
    C: ControlPlane + 'static,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState<C>>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role == Role::Student {
            Ok(Self(user))
        } else {
            Err(ApiError::Forbidden("student role required".into()))
        }
    }
}
