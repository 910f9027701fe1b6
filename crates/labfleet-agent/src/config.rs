//! Agent configuration.

/// Configuration for the agent process.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Host name advertised in access URLs handed back to the controller.
    pub advertised_host: String,
    /// Listen address for the HTTP API.
    pub listen_addr: String,
}

impl AgentConfig {
    /// Load configuration from the environment, falling back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            advertised_host: std::env::var("AGENT_HOST").unwrap_or_else(|_| "localhost".into()),
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".into()),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            advertised_host: "localhost".into(),
            listen_addr: "0.0.0.0:5000".into(),
        }
    }
}
