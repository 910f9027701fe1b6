//! Request types and configuration for the orchestration plane.

use std::time::Duration;

use chrono::{DateTime, Utc};
use labfleet_core::Role;
use serde::Deserialize;

/// Bounds enforced on booking requests.
pub mod limits {
    /// Minimum CPU cores per booking.
    pub const CPU_MIN: u32 = 1;
    /// Maximum CPU cores per booking.
    pub const CPU_MAX: u32 = 16;
    /// Minimum booking duration in hours.
    pub const DURATION_MIN_HR: u32 = 1;
    /// Maximum booking duration in hours.
    pub const DURATION_MAX_HR: u32 = 24;
    /// Maximum image reference length.
    pub const IMAGE_MAX_LEN: usize = 100;
    /// Minimum password length at registration.
    pub const PASSWORD_MIN_LEN: usize = 6;
    /// Minimum display name length at registration.
    pub const NAME_MIN_LEN: usize = 2;
    /// Maximum display name length at registration.
    pub const NAME_MAX_LEN: usize = 80;
}

/// A user's request for a compute session.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    /// Requested CPU cores, 1 to 16.
    pub cpu: u32,
    /// Requested memory, `\d+[gm]` (e.g. `"4g"`).
    pub memory: String,
    /// Container image to run.
    pub image: String,
    /// Session start; must be strictly in the future.
    pub start_time: DateTime<Utc>,
    /// Session length in hours, 1 to 24.
    pub duration_hr: u32,
    /// Optional capability tags; stored with the booking, unused by
    /// selection.
    #[serde(default)]
    pub tags: Option<String>,
}

/// A registration request.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Display name.
    pub name: String,
    /// Email address; must be unique.
    pub email: String,
    /// Plaintext password; hashed before storage.
    pub password: String,
    /// Requested role; defaults to student.
    #[serde(default)]
    pub role: Option<Role>,
}

/// Configuration for the reconciler and health monitor.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Seconds between ticks.
    pub tick_interval_secs: u64,
    /// How far ahead of a booking's start to send Wake-on-LAN.
    pub wake_lead_secs: u64,
    /// Base of the 1000-port window used for container bindings.
    pub port_base: u16,
    /// Ceiling on each health probe.
    pub health_timeout_secs: u64,
    /// Ceiling on each container start call.
    pub start_timeout_secs: u64,
    /// Ceiling on each container stop call.
    pub stop_timeout_secs: u64,
    /// Run drift reconciliation every this many ticks.
    pub drift_every_ticks: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            wake_lead_secs: 600,
            port_base: 8000,
            health_timeout_secs: 5,
            start_timeout_secs: 15,
            stop_timeout_secs: 15,
            drift_every_ticks: 10,
        }
    }
}

impl ReconcilerConfig {
    /// The tick interval as a `Duration`.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    /// The pre-wake lead as a chrono `Duration`.
    #[must_use]
    pub fn wake_lead(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.wake_lead_secs).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(60));
        assert_eq!(config.wake_lead(), chrono::Duration::minutes(10));
        assert_eq!(config.port_base, 8000);
        assert_eq!(config.health_timeout_secs, 5);
        assert_eq!(config.start_timeout_secs, 15);
        assert_eq!(config.stop_timeout_secs, 15);
    }
}
