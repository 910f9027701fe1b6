//! Booking lifecycle state machine.
//!
//! This module defines the valid state transitions for bookings and provides
//! validation helpers. The reconciler and the admin/booking services only
//! move bookings along these edges; the store's guarded transitions enforce
//! them at commit time.
//!
//! # State Machine
//!
//! ```text
//!  Pending ── approve ──► Approved ── start ──► Active ── expire ──► Completed
//!     │                      │
//!     │                      └── cancel ──► Cancelled
//!     ├── reject ──► Rejected
//!     └── cancel ──► Cancelled
//! ```
//!
//! `Rejected`, `Cancelled`, and `Completed` are terminal. There is no
//! mid-run cancellation: an `Active` booking only ever completes.

use labfleet_store::BookingStatus;

/// Check if a state transition is valid according to the state machine.
#[must_use]
pub const fn is_valid_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::{Active, Approved, Cancelled, Completed, Pending, Rejected};

    matches!(
        (from, to),
        (Pending, Approved | Rejected | Cancelled)
            | (Approved, Active | Cancelled)
            | (Active, Completed)
    )
}

/// Returns true if the owner may still cancel a booking in this status.
#[must_use]
pub const fn can_cancel(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::Approved)
}

/// Returns the list of valid target states from the given state.
#[must_use]
pub fn valid_transitions_from(status: BookingStatus) -> Vec<BookingStatus> {
    use BookingStatus::{Active, Approved, Cancelled, Completed, Pending, Rejected};

    match status {
        Pending => vec![Approved, Rejected, Cancelled],
        Approved => vec![Active, Cancelled],
        Active => vec![Completed],
        Rejected | Completed | Cancelled => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::{Active, Approved, Cancelled, Completed, Pending, Rejected};

    #[test]
    fn valid_edges() {
        assert!(is_valid_transition(Pending, Approved));
        assert!(is_valid_transition(Pending, Rejected));
        assert!(is_valid_transition(Pending, Cancelled));
        assert!(is_valid_transition(Approved, Active));
        assert!(is_valid_transition(Approved, Cancelled));
        assert!(is_valid_transition(Active, Completed));
    }

    #[test]
    fn invalid_edges() {
        // No mid-run cancel.
        assert!(!is_valid_transition(Active, Cancelled));
        // No skipping approval.
        assert!(!is_valid_transition(Pending, Active));
        // Terminal states never leave.
        for terminal in [Rejected, Cancelled, Completed] {
            for target in [Pending, Approved, Active, Rejected, Cancelled, Completed] {
                assert!(!is_valid_transition(terminal, target));
            }
        }
    }

    #[test]
    fn cancel_eligibility() {
        assert!(can_cancel(Pending));
        assert!(can_cancel(Approved));
        assert!(!can_cancel(Active));
        assert!(!can_cancel(Completed));
        assert!(!can_cancel(Rejected));
        assert!(!can_cancel(Cancelled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(valid_transitions_from(Rejected).is_empty());
        assert!(valid_transitions_from(Cancelled).is_empty());
        assert!(valid_transitions_from(Completed).is_empty());
        assert_eq!(valid_transitions_from(Active), vec![Completed]);
    }
}
