//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary user records, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Unique index: user id by email, keyed by the raw email bytes.
    pub const USERS_BY_EMAIL: &str = "users_by_email";

    /// Primary agent records, keyed by `agent_id`.
    pub const AGENTS: &str = "agents";

    /// Index: agents by status, keyed by `status || agent_id`.
    pub const AGENTS_BY_STATUS: &str = "agents_by_status";

    /// Primary booking records, keyed by `booking_id`.
    pub const BOOKINGS: &str = "bookings";

    /// Index: bookings by owner, keyed by `user_id || booking_id`.
    pub const BOOKINGS_BY_USER: &str = "bookings_by_user";

    /// Index: bookings by status ordered by start time,
    /// keyed by `status || start_ts || booking_id`.
    pub const BOOKINGS_BY_STATUS_START: &str = "bookings_by_status_start";

    /// Index: bookings by status ordered by end time,
    /// keyed by `status || end_ts || booking_id`.
    pub const BOOKINGS_BY_STATUS_END: &str = "bookings_by_status_end";

    /// Counters and other metadata, keyed by name.
    pub const META: &str = "meta";
}

/// Counter keys stored in the `meta` column family.
pub mod counter {
    /// Next user id to assign.
    pub const USER: &str = "next_user_id";

    /// Next agent id to assign.
    pub const AGENT: &str = "next_agent_id";

    /// Next booking id to assign.
    pub const BOOKING: &str = "next_booking_id";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::USERS_BY_EMAIL,
        cf::AGENTS,
        cf::AGENTS_BY_STATUS,
        cf::BOOKINGS,
        cf::BOOKINGS_BY_USER,
        cf::BOOKINGS_BY_STATUS_START,
        cf::BOOKINGS_BY_STATUS_END,
        cf::META,
    ]
}
