//! Gateway configuration.

use std::time::Duration;

use labfleet_control::ReconcilerConfig;

/// Configuration for the controller process.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address (e.g. `0.0.0.0:8000`).
    pub listen_addr: String,
    /// Directory holding the RocksDB store.
    pub data_dir: String,
    /// HMAC signing secret for bearer tokens.
    pub token_secret: String,
    /// Token lifetime in hours.
    pub token_ttl_hours: u32,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_seconds: u64,
    /// Reconciler and health monitor settings.
    pub reconciler: ReconcilerConfig,
}

impl GatewayConfig {
    /// Load configuration from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = ReconcilerConfig::default();
        let reconciler = ReconcilerConfig {
            tick_interval_secs: env_u64("TICK_INTERVAL_SECS", defaults.tick_interval_secs),
            wake_lead_secs: env_u64("WAKE_LEAD_SECS", defaults.wake_lead_secs),
            port_base: env_u16("PORT_BASE", defaults.port_base),
            health_timeout_secs: env_u64("HEALTH_TIMEOUT_SECS", defaults.health_timeout_secs),
            start_timeout_secs: env_u64("START_TIMEOUT_SECS", defaults.start_timeout_secs),
            stop_timeout_secs: env_u64("STOP_TIMEOUT_SECS", defaults.stop_timeout_secs),
            drift_every_ticks: env_u64("DRIFT_EVERY_TICKS", defaults.drift_every_ticks),
        };

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/labfleet".into()),
            token_secret: std::env::var("TOKEN_SECRET").unwrap_or_else(|_| "dev-secret".into()),
            token_ttl_hours: env_u32("TOKEN_TTL_HOURS", 12),
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            reconciler,
        }
    }

    /// The request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".into(),
            data_dir: "/data/labfleet".into(),
            token_secret: "dev-secret".into(),
            token_ttl_hours: 12,
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            reconciler: ReconcilerConfig::default(),
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> u16 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.reconciler.tick_interval_secs, 60);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
