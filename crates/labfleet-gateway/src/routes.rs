//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use labfleet_control::ControlPlane;

use crate::handlers::{admin, auth, student};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Auth (public)
/// - `POST /api/auth/register` - Create a user
/// - `POST /api/auth/login` - Issue a bearer token
/// - `POST /api/auth/logout` - Stateless acknowledgment
///
/// ## Student (student role)
/// - `POST /api/student/book` - Submit a booking
/// - `GET /api/student/bookings` - List own bookings
/// - `POST /api/student/bookings/:id/cancel` - Cancel a booking
/// - `GET /api/student/profile` - Own profile
///
/// ## Admin (admin role)
/// - `GET /api/admin/bookings?status=` - List all bookings
/// - `POST /api/admin/approve/:id` - Approve a booking
/// - `POST /api/admin/reject/:id` - Reject a booking
/// - `POST /api/admin/extend/:id` - Extend an active booking
/// - `GET /api/admin/agents` - List agents
/// - `POST /api/admin/agents/:id/status` - Override agent status
/// - `GET /api/admin/stats` - Counts by status
pub fn create_router<C>(state: GatewayState<C>) -> Router
where
    C: ControlPlane + 'static,
{
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout();

    let state = Arc::new(state);

    Router::new()
        // Auth
        .route("/api/auth/register", post(auth::register::<C>))
        .route("/api/auth/login", post(auth::login::<C>))
        .route("/api/auth/logout", post(auth::logout))
        // Student
        .route("/api/student/book", post(student::book::<C>))
        .route("/api/student/bookings", get(student::list_bookings::<C>))
        .route(
            "/api/student/bookings/:id/cancel",
            post(student::cancel_booking::<C>),
        )
        .route("/api/student/profile", get(student::profile::<C>))
        // Admin
        .route("/api/admin/bookings", get(admin::list_bookings::<C>))
        .route("/api/admin/approve/:id", post(admin::approve::<C>))
        .route("/api/admin/reject/:id", post(admin::reject::<C>))
        .route("/api/admin/extend/:id", post(admin::extend::<C>))
        .route("/api/admin/agents", get(admin::list_agents::<C>))
        .route(
            "/api/admin/agents/:id/status",
            post(admin::set_agent_status::<C>),
        )
        .route("/api/admin/stats", get(admin::stats::<C>))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
