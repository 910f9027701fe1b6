//! Student-facing booking endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use labfleet_control::{Booking, BookingRequest, ControlPlane};
use labfleet_core::{BookingId, Role, UserId};
use labfleet_store::BookingStatus;

use crate::auth::Student;
use crate::error::ApiError;
use crate::state::GatewayState;

/// One booking in the caller's listing.
#[derive(Debug, Serialize)]
pub struct BookingSummary {
    /// Booking id.
    pub id: BookingId,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Scheduled start.
    pub start: DateTime<Utc>,
    /// Scheduled end.
    pub end: DateTime<Utc>,
    /// Access URL once the session is running.
    pub url: Option<String>,
    /// Container image.
    pub image: String,
    /// Requested CPU cores.
    pub cpu: u32,
    /// Requested memory as submitted.
    pub memory: String,
}

impl From<Booking> for BookingSummary {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            status: booking.status,
            start: booking.start_time,
            end: booking.end_time,
            url: booking.access_url,
            image: booking.image,
            cpu: booking.cpu,
            memory: booking.memory,
        }
    }
}

/// Response for the profile endpoint.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Role.
    pub role: Role,
    /// Department label.
    pub department: String,
    /// Whether the account is enabled.
    pub active: bool,
}

/// Submit a booking request.
///
/// # Errors
///
/// Returns 400 on validation failure and 409 if the interval overlaps one
/// of the caller's approved or active bookings.
pub async fn book<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Student(user): Student,
    Json(body): Json<BookingRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let booking = state.control.create_booking(user.user_id, body).await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "msg": "Booking submitted", "id": booking.id })),
    ))
}

/// List the caller's bookings, newest first.
///
/// # Errors
///
/// Returns an error if the control plane operation fails.
pub async fn list_bookings<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Student(user): Student,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let bookings = state.control.list_user_bookings(user.user_id).await?;
    let summaries: Vec<BookingSummary> = bookings.into_iter().map(BookingSummary::from).collect();
    Ok(Json(summaries))
}

/// Cancel one of the caller's bookings.
///
/// # Errors
///
/// Returns 404 if the booking doesn't exist or isn't the caller's, and 409
/// if it is no longer pending or approved.
pub async fn cancel_booking<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Student(user): Student,
    Path(booking_id): Path<BookingId>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    state
        .control
        .cancel_booking(user.user_id, booking_id)
        .await?;

    Ok(Json(serde_json::json!({ "msg": "Booking cancelled" })))
}

/// Return the caller's profile.
///
/// # Errors
///
/// Returns 404 if the user row is missing.
pub async fn profile<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Student(user): Student,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let user = state.control.get_profile(user.user_id).await?;

    Ok(Json(ProfileResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        department: user.department,
        active: user.active,
    }))
}
