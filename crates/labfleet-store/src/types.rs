//! Domain types stored in the database.
//!
//! These types represent the persisted state of users, agents, and bookings.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use labfleet_core::{AgentId, BookingId, UserId};
use serde::{Deserialize, Serialize};

pub use labfleet_core::Role;

/// A user record stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address (unique).
    pub email: String,
    /// Bcrypt password hash.
    pub password_hash: String,
    /// Role used for route gating.
    pub role: Role,
    /// Department label shown on the profile.
    pub department: String,
    /// Soft-disable flag; disabled users cannot log in.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// An agent (worker host) record stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier for the agent.
    pub id: AgentId,
    /// Human-readable name.
    pub name: String,
    /// IP address the controller dials.
    pub ip: String,
    /// MAC address, required for Wake-on-LAN.
    pub mac: Option<String>,
    /// Agent HTTP port.
    pub port: u16,
    /// Whether pre-wake packets should be sent to this host.
    pub wol_enabled: bool,
    /// Observed status, written by the health monitor and admin overrides.
    pub status: AgentStatus,
    /// Last time a health probe succeeded.
    pub last_seen: DateTime<Utc>,
    /// Total CPU cores on the host.
    pub total_cpu: u32,
    /// Total memory in GB on the host.
    pub total_mem_gb: u32,
    /// Cores not currently debited by active bookings.
    pub available_cpu: u32,
    /// GB not currently debited by active bookings.
    pub available_mem_gb: u32,
    /// Free-form capability tags; unused by selection.
    pub tags: BTreeSet<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// The base URL of this agent's HTTP API.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ip, self.port)
    }
}

/// Observed status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AgentStatus {
    /// Health probe succeeded recently.
    Online = 1,
    /// Health probe failed or timed out.
    Offline = 2,
    /// Admin-pinned; excluded from selection and starts, still probed.
    Maintenance = 3,
}

impl AgentStatus {
    /// Convert the status to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert a numeric value to an `AgentStatus`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Online),
            2 => Some(Self::Offline),
            3 => Some(Self::Maintenance),
            _ => None,
        }
    }

    /// Parse from the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

/// A booking record stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Unique identifier for the booking.
    pub id: BookingId,
    /// Owner.
    pub user_id: UserId,
    /// Bound agent; set on approval.
    pub agent_id: Option<AgentId>,
    /// Requested CPU cores.
    pub cpu: u32,
    /// Requested memory as submitted (e.g. `"4g"`).
    pub memory: String,
    /// Requested memory in whole GB; all capacity math uses this.
    pub mem_gb: u32,
    /// Container image to run.
    pub image: String,
    /// Scheduled session start.
    pub start_time: DateTime<Utc>,
    /// Scheduled session end.
    pub end_time: DateTime<Utc>,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Name of the running container; set when the session starts.
    pub container_name: Option<String>,
    /// URL handed back to the user; set when the session starts.
    pub access_url: Option<String>,
    /// Reason recorded on rejection.
    pub rejection_reason: Option<String>,
    /// Free-form notes (request tags land here).
    pub notes: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BookingStatus {
    /// Submitted, awaiting admin decision.
    Pending = 1,
    /// Approved and bound to an agent, awaiting start.
    Approved = 2,
    /// Rejected by an admin. Terminal.
    Rejected = 3,
    /// Container running.
    Active = 4,
    /// Session ended and container reaped. Terminal.
    Completed = 5,
    /// Cancelled by the owner. Terminal.
    Cancelled = 6,
}

impl BookingStatus {
    /// Convert the status to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert a numeric value to a `BookingStatus`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Pending),
            2 => Some(Self::Approved),
            3 => Some(Self::Rejected),
            4 => Some(Self::Active),
            5 => Some(Self::Completed),
            6 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Parse from the stored string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Returns true for statuses a booking never leaves.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }

    /// All statuses, for stats aggregation.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::Pending,
            Self::Approved,
            Self::Rejected,
            Self::Active,
            Self::Completed,
            Self::Cancelled,
        ]
    }
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Email address; must be unique.
    pub email: String,
    /// Bcrypt password hash.
    pub password_hash: String,
    /// Role for route gating.
    pub role: Role,
    /// Department label.
    pub department: String,
}

/// Fields required to register an agent.
#[derive(Debug, Clone)]
pub struct NewAgent {
    /// Human-readable name.
    pub name: String,
    /// IP address the controller dials.
    pub ip: String,
    /// MAC address for Wake-on-LAN.
    pub mac: Option<String>,
    /// Agent HTTP port.
    pub port: u16,
    /// Whether pre-wake packets should be sent.
    pub wol_enabled: bool,
    /// Initial observed status.
    pub status: AgentStatus,
    /// Total CPU cores.
    pub total_cpu: u32,
    /// Total memory in GB.
    pub total_mem_gb: u32,
    /// Capability tags.
    pub tags: BTreeSet<String>,
}

/// Fields required to submit a booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// Owner.
    pub user_id: UserId,
    /// Requested CPU cores.
    pub cpu: u32,
    /// Requested memory as submitted.
    pub memory: String,
    /// Requested memory in whole GB.
    pub mem_gb: u32,
    /// Container image.
    pub image: String,
    /// Scheduled start.
    pub start_time: DateTime<Utc>,
    /// Scheduled end.
    pub end_time: DateTime<Utc>,
    /// Free-form notes.
    pub notes: String,
}

/// Counts by booking status plus online agents, from one snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    /// Total bookings in the store.
    pub total_bookings: u64,
    /// Bookings awaiting a decision.
    pub pending: u64,
    /// Bookings bound and awaiting start.
    pub approved: u64,
    /// Bookings currently running.
    pub active: u64,
    /// Bookings that ran to completion.
    pub completed: u64,
    /// Rejected bookings.
    pub rejected: u64,
    /// Cancelled bookings.
    pub cancelled: u64,
    /// Agents currently observed online.
    pub online_agents: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_u8_roundtrip() {
        for status in BookingStatus::all() {
            assert_eq!(BookingStatus::from_u8(status.as_u8()), Some(status));
        }
        assert_eq!(BookingStatus::from_u8(0), None);
        assert_eq!(BookingStatus::from_u8(7), None);
    }

    #[test]
    fn status_string_roundtrip() {
        assert_eq!(BookingStatus::parse("pending"), Some(BookingStatus::Pending));
        assert_eq!(BookingStatus::parse("active"), Some(BookingStatus::Active));
        assert_eq!(BookingStatus::parse("unknown"), None);
        assert_eq!(AgentStatus::parse("maintenance"), Some(AgentStatus::Maintenance));
        assert_eq!(AgentStatus::parse("ONLINE"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(BookingStatus::Rejected.is_terminal());
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Approved.is_terminal());
        assert!(!BookingStatus::Active.is_terminal());
    }

    #[test]
    fn agent_base_url() {
        let agent = Agent {
            id: AgentId::new(1),
            name: "rack-1".into(),
            ip: "10.0.0.5".into(),
            mac: None,
            port: 5000,
            wol_enabled: false,
            status: AgentStatus::Online,
            last_seen: Utc::now(),
            total_cpu: 8,
            total_mem_gb: 16,
            available_cpu: 8,
            available_mem_gb: 16,
            tags: BTreeSet::new(),
            created_at: Utc::now(),
        };
        assert_eq!(agent.base_url(), "http://10.0.0.5:5000");
    }
}
