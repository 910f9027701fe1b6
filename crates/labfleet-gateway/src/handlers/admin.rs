//! Admin endpoints: booking decisions, agent administration, stats.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use labfleet_control::{Booking, ControlPlane};
use labfleet_core::{AgentId, BookingId, UserId};
use labfleet_store::{Agent, AgentStatus, BookingStatus};

use crate::auth::Admin;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Query parameters for the booking listing.
#[derive(Debug, Deserialize)]
pub struct BookingFilter {
    /// Optional status filter (e.g. `pending`).
    #[serde(default)]
    pub status: Option<String>,
}

/// One booking in the admin listing.
#[derive(Debug, Serialize)]
pub struct AdminBookingRow {
    /// Booking id.
    pub id: BookingId,
    /// Owner id.
    pub user_id: UserId,
    /// Owner display name.
    pub user_name: String,
    /// Bound agent, if approved.
    pub agent_id: Option<AgentId>,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Scheduled start.
    pub start: DateTime<Utc>,
    /// Scheduled end.
    pub end: DateTime<Utc>,
    /// Container image.
    pub image: String,
    /// Requested CPU cores.
    pub cpu: u32,
    /// Requested memory as submitted.
    pub memory: String,
    /// Access URL if running or completed.
    pub url: Option<String>,
    /// Rejection reason, if rejected.
    pub rejection_reason: Option<String>,
}

/// Request body for approval.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    /// Explicit agent to bind; auto-selected when absent.
    #[serde(default)]
    pub agent_id: Option<AgentId>,
}

/// Request body for rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RejectBody {
    /// Reason surfaced to the booking's owner.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Request body for extension.
#[derive(Debug, Default, Deserialize)]
pub struct ExtendBody {
    /// Hours to add to the end time.
    #[serde(default)]
    pub hours: Option<u32>,
}

/// Request body for agent status updates.
#[derive(Debug, Deserialize)]
pub struct AgentStatusBody {
    /// New status: `online`, `offline`, or `maintenance`.
    pub status: String,
}

/// One agent in the admin listing.
#[derive(Debug, Serialize)]
pub struct AgentRow {
    /// Agent id.
    pub id: AgentId,
    /// Name.
    pub name: String,
    /// IP address.
    pub ip: String,
    /// Observed status.
    pub status: AgentStatus,
    /// Last successful health probe.
    pub last_seen: DateTime<Utc>,
    /// Cores not debited by active bookings.
    pub available_cpu: u32,
    /// GB not debited by active bookings.
    pub available_mem_gb: u32,
    /// Total cores.
    pub total_cpu: u32,
    /// Total GB.
    pub total_mem_gb: u32,
    /// Capability tags.
    pub tags: BTreeSet<String>,
}

impl From<Agent> for AgentRow {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name,
            ip: agent.ip,
            status: agent.status,
            last_seen: agent.last_seen,
            available_cpu: agent.available_cpu,
            available_mem_gb: agent.available_mem_gb,
            total_cpu: agent.total_cpu,
            total_mem_gb: agent.total_mem_gb,
            tags: agent.tags,
        }
    }
}

/// List all bookings, optionally filtered by status.
///
/// # Errors
///
/// Returns 400 for unknown status filters.
pub async fn list_bookings<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Admin(_): Admin,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let status = match filter.status.as_deref() {
        None | Some("") => None,
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown status: {s}")))?,
        ),
    };

    let bookings = state.control.list_bookings(status).await?;

    let mut rows = Vec::with_capacity(bookings.len());
    for booking in bookings {
        rows.push(admin_row(state.as_ref(), booking).await?);
    }

    Ok(Json(rows))
}

async fn admin_row<C>(state: &GatewayState<C>, booking: Booking) -> Result<AdminBookingRow, ApiError>
where
    C: ControlPlane + 'static,
{
    let user_name = state
        .control
        .get_user(booking.user_id)
        .await?
        .map_or_else(|| "Unknown".to_string(), |u| u.name);

    Ok(AdminBookingRow {
        id: booking.id,
        user_id: booking.user_id,
        user_name,
        agent_id: booking.agent_id,
        status: booking.status,
        start: booking.start_time,
        end: booking.end_time,
        image: booking.image,
        cpu: booking.cpu,
        memory: booking.memory,
        url: booking.access_url,
        rejection_reason: booking.rejection_reason,
    })
}

/// Approve a pending booking.
///
/// # Errors
///
/// Returns 404 for unknown bookings, 409 for wrong-status bookings, 400
/// for an unavailable named agent, and 503 when auto-selection finds none.
pub async fn approve<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Admin(_): Admin,
    Path(booking_id): Path<BookingId>,
    body: Option<Json<ApproveBody>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let agent_id = body.map(|Json(b)| b.agent_id).unwrap_or_default();
    let booking = state.control.approve_booking(booking_id, agent_id).await?;

    Ok(Json(serde_json::json!({
        "msg": "Booking approved",
        "agent_id": booking.agent_id,
    })))
}

/// Reject a pending booking.
///
/// # Errors
///
/// Returns 404 for unknown bookings and 409 for wrong-status bookings.
pub async fn reject<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Admin(_): Admin,
    Path(booking_id): Path<BookingId>,
    body: Option<Json<RejectBody>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "Rejected by admin".to_string());
    state.control.reject_booking(booking_id, &reason).await?;

    Ok(Json(serde_json::json!({ "msg": "Booking rejected" })))
}

/// Extend an active booking.
///
/// # Errors
///
/// Returns 404 for unknown bookings and 409 unless the booking is active.
pub async fn extend<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Admin(_): Admin,
    Path(booking_id): Path<BookingId>,
    body: Option<Json<ExtendBody>>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let hours = body.and_then(|Json(b)| b.hours).unwrap_or(1);
    let booking = state.control.extend_booking(booking_id, hours).await?;

    Ok(Json(serde_json::json!({
        "msg": "Booking extended",
        "new_end": booking.end_time,
    })))
}

/// List all agents with capacity and status.
///
/// # Errors
///
/// Returns an error if the control plane operation fails.
pub async fn list_agents<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Admin(_): Admin,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let agents = state.control.list_agents().await?;
    let rows: Vec<AgentRow> = agents.into_iter().map(AgentRow::from).collect();
    Ok(Json(rows))
}

/// Set an agent's status.
///
/// # Errors
///
/// Returns 400 for unknown status strings and 404 for unknown agents.
pub async fn set_agent_status<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Admin(_): Admin,
    Path(agent_id): Path<AgentId>,
    Json(body): Json<AgentStatusBody>,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let status = AgentStatus::parse(&body.status)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid status: {}", body.status)))?;

    state.control.set_agent_status(agent_id, status).await?;

    Ok(Json(serde_json::json!({ "msg": "Agent status updated" })))
}

/// Counts by booking status plus online agents.
///
/// # Errors
///
/// Returns an error if the control plane operation fails.
pub async fn stats<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Admin(_): Admin,
) -> Result<impl IntoResponse, ApiError>
where
    C: ControlPlane + 'static,
{
    let stats = state.control.stats().await?;
    Ok(Json(stats))
}
