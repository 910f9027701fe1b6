//! User roles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role assigned to a user, carried in token claims and checked by the
/// gateway's route gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May approve, reject, and extend bookings and manage agents.
    Admin,
    /// May submit and cancel their own bookings.
    Student,
}

impl Role {
    /// The stored string form of this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Student => "student",
        }
    }

    /// Parse from the stored string form. Unknown strings are rejected;
    /// there is no default role.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Self::Admin),
            "student" => Some(Self::Student),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
