//! Orchestration plane for labfleet compute session bookings.
//!
//! This crate provides the core business logic for brokering time-bounded,
//! resource-limited compute sessions on a fleet of worker hosts:
//!
//! - The booking and admin services ([`ControlPlane`] / [`ControlPlaneService`])
//! - The booking lifecycle state machine ([`lifecycle`])
//! - The periodic [`Reconciler`] that wakes hosts, starts due sessions,
//!   stops expired ones, and repairs drift
//! - The health monitor ([`health`]) probing every agent each tick
//! - The typed outbound agent RPC client ([`agent_client`])
//! - Wake-on-LAN packet construction and broadcast ([`wol`])
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (HTTP API)                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ControlPlaneService                      │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  Booking    │ │   Admin     │ │    Lifecycle        │    │
//! │  │  Service    │ │   Service   │ │    State Machine    │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                  ▲
//!          ▼                                  │ tick
//! ┌──────────────┐   per-call HTTP   ┌─────────────────┐
//! │    Store     │◄──────────────────│   Reconciler    │
//! │  (RocksDB)   │                   │ + HealthMonitor │
//! └──────────────┘                   └─────────────────┘
//!                                             │
//!                                             ▼
//!                                    ┌─────────────────┐
//!                                    │  Agents (HTTP)  │
//!                                    └─────────────────┘
//! ```
//!
//! # State Machine
//!
//! Bookings follow a strict state machine:
//!
//! - `Pending` → `Approved` (admin), `Rejected` (admin), or `Cancelled` (owner)
//! - `Approved` → `Active` (reconciler start) or `Cancelled` (owner)
//! - `Active` → `Completed` (reconciler expiry)
//! - `Rejected`, `Cancelled`, `Completed` are terminal
//!
//! See the [`lifecycle`] module for transition validation helpers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod agent_client;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod reconciler;
pub mod service;
pub mod types;
pub mod wol;

pub use agent_client::{
    AgentCallError, AgentClient, ContainerSummary, HttpAgentClient, StartContainerRequest,
    StartContainerResponse, StopOutcome,
};
pub use error::{ControlError, Result, ValidationErrors};
pub use reconciler::Reconciler;
pub use service::{ControlPlane, ControlPlaneService};
pub use types::{BookingRequest, ReconcilerConfig, RegisterRequest};

// Re-export commonly used types from dependencies for convenience
pub use labfleet_core::{AgentId, BookingId, Role, UserId};
pub use labfleet_store::{
    Agent, AgentStatus, Booking, BookingStatus, NewAgent, Store, StoreStats, User,
};
