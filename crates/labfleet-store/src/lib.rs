//! `RocksDB` storage layer for labfleet.
//!
//! This crate provides persistent storage for users, agents, and bookings
//! using `RocksDB` with column families for efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `users` / `users_by_email`: User records and the unique email index
//! - `agents` / `agents_by_status`: Agent records and the status index
//! - `bookings`: Primary booking records, keyed by `booking_id`
//! - `bookings_by_user`: Index for listing a user's bookings
//! - `bookings_by_status_start` / `bookings_by_status_end`: Time-ordered
//!   status indexes backing the reconciler's phase selections
//! - `meta`: Monotonic id counters
//!
//! Every mutation that couples a booking status change to an agent capacity
//! change is committed as a single `WriteBatch` under the store's write
//! lock, so capacity is never lost or double-counted across retries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;
pub use types::{
    Agent, AgentStatus, Booking, BookingStatus, NewAgent, NewBooking, NewUser, Role, StoreStats,
    User,
};

use chrono::{DateTime, Utc};
use labfleet_core::{AgentId, BookingId, UserId};

/// The storage trait defining all database operations.
///
/// All guarded transitions (`approve_booking`, `activate_booking`, …) are
/// compare-and-commit: the booking is re-read under the write lock, the
/// expected status is checked, and the transition plus any coupled capacity
/// change is committed atomically. A failed guard surfaces as
/// [`StoreError::WrongStatus`] and writes nothing.
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Create a user, enforcing email uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmailExists`] if the email is taken.
    fn create_user(&self, new: NewUser) -> Result<User>;

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, id: UserId) -> Result<Option<User>>;

    /// Look up a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    // =========================================================================
    // Agent Operations
    // =========================================================================

    /// Register an agent, assigning its id. Available capacity starts equal
    /// to total capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_agent(&self, new: NewAgent) -> Result<Agent>;

    /// Get an agent by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_agent(&self, id: AgentId) -> Result<Option<Agent>>;

    /// List all agents.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_agents(&self) -> Result<Vec<Agent>>;

    /// List all agents with the given status.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_agents_by_status(&self, status: AgentStatus) -> Result<Vec<Agent>>;

    /// Set an agent's status (admin override).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the agent doesn't exist.
    fn set_agent_status(&self, id: AgentId, status: AgentStatus) -> Result<Agent>;

    /// Record a health probe result. A successful probe sets the agent
    /// online and advances `last_seen`; a failed probe sets it offline and
    /// leaves `last_seen` untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the agent doesn't exist.
    fn record_agent_health(&self, id: AgentId, healthy: bool, now: DateTime<Utc>) -> Result<()>;

    // =========================================================================
    // Booking Operations
    // =========================================================================

    /// Create a booking with `status = pending`, assigning its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn create_booking(&self, new: NewBooking, now: DateTime<Utc>) -> Result<Booking>;

    /// Get a booking by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_booking(&self, id: BookingId) -> Result<Option<Booking>>;

    /// List all bookings, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_bookings(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>>;

    /// List a user's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_bookings_by_user(&self, user_id: UserId) -> Result<Vec<Booking>>;

    /// List a user's bookings in any of the given statuses. Used by the
    /// overlap check at submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn bookings_in_states_for_user(
        &self,
        user_id: UserId,
        states: &[BookingStatus],
    ) -> Result<Vec<Booking>>;

    /// Approved bookings with `start_time <= ts` (reconciler phase B).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn approved_starting_before(&self, ts: DateTime<Utc>) -> Result<Vec<Booking>>;

    /// Approved bookings with `from < start_time <= to` (pre-wake window).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn approved_starting_within(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Booking>>;

    /// Active bookings with `end_time <= ts` (reconciler phase C).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn active_ending_before(&self, ts: DateTime<Utc>) -> Result<Vec<Booking>>;

    /// Active bookings bound to the given agent (drift reconciliation).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn active_bookings_on_agent(&self, agent_id: AgentId) -> Result<Vec<Booking>>;

    // =========================================================================
    // Guarded Transitions
    // =========================================================================

    /// `pending -> approved`, binding the booking to an agent. Capacity is
    /// not debited here; that happens at activation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WrongStatus`] unless the booking is pending.
    fn approve_booking(&self, id: BookingId, agent_id: AgentId, now: DateTime<Utc>)
        -> Result<Booking>;

    /// `pending -> rejected`, recording the reason.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WrongStatus`] unless the booking is pending.
    fn reject_booking(&self, id: BookingId, reason: &str, now: DateTime<Utc>) -> Result<Booking>;

    /// `pending|approved -> cancelled`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WrongStatus`] for any other current status.
    fn cancel_booking(&self, id: BookingId, now: DateTime<Utc>) -> Result<Booking>;

    /// Push an active booking's `end_time` out by the given hours.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WrongStatus`] unless the booking is active.
    fn extend_booking(&self, id: BookingId, hours: u32, now: DateTime<Utc>) -> Result<Booking>;

    /// `approved -> active`, recording the container coordinates and
    /// debiting the bound agent's capacity in the same commit.
    ///
    /// This is the commit guard that makes a cancel racing a start
    /// harmless: if the booking is no longer approved nothing is written
    /// and [`StoreError::WrongStatus`] is returned.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WrongStatus`] unless the booking is approved,
    /// or [`StoreError::InsufficientCapacity`] if the debit would take the
    /// agent's available resources negative.
    fn activate_booking(
        &self,
        id: BookingId,
        container_name: &str,
        access_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Booking>;

    /// `active -> completed`, crediting the bound agent's capacity in the
    /// same commit. Credits are clamped so `available_*` never exceeds
    /// `total_*` (absorbs admin-driven capacity shrinks).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WrongStatus`] unless the booking is active.
    fn complete_booking(&self, id: BookingId, now: DateTime<Utc>) -> Result<Booking>;

    // =========================================================================
    // Stats
    // =========================================================================

    /// Counts by booking status plus online agents, from one snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn stats(&self) -> Result<StoreStats>;
}
