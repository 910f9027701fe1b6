//! Container runtime backed by the local Docker daemon.
//!
//! The [`ContainerRuntime`] trait is the seam between the HTTP handlers and
//! Docker; [`DockerRuntime`] is the production implementation over
//! `bollard`. Containers are named `compute_<user_id>_<5-digit-random>`,
//! labeled so they can be recognized later, and limited to the booked CPU
//! quota and memory.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use futures::TryStreamExt;
use rand::Rng;
use thiserror::Error;

/// Label identifying containers this system manages.
pub const MANAGED_BY_LABEL: &str = "compute_booking";

/// Seconds a container gets to exit cleanly before it is killed.
const STOP_GRACE_SECS: i64 = 10;

/// Attempts at generating a non-colliding container name.
const NAME_ATTEMPTS: usize = 3;

/// Errors from the container runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The image is unknown and could not be pulled.
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// No container by that name exists.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The Docker daemon reported a failure.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Parameters for launching a session container.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Booking owner, recorded as a label and environment variable.
    pub user_id: u64,
    /// Image to run.
    pub image: String,
    /// CPU cores to grant.
    pub cpu: u32,
    /// Memory limit as submitted (e.g. `"4g"`).
    pub memory: String,
    /// Host port to bind; the container port is the same number.
    pub port: u16,
}

/// One managed container, as reported by `/containers`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ContainerInfo {
    /// Truncated container id.
    pub id: String,
    /// Container name.
    pub name: String,
    /// Runtime status string.
    pub status: String,
    /// Container labels.
    pub labels: HashMap<String, String>,
}

/// The runtime operations the HTTP surface needs.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create and start a session container, returning its name.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ImageNotFound`] if the image cannot be
    /// pulled, or [`RuntimeError::Runtime`] for daemon failures.
    async fn start(&self, spec: &LaunchSpec) -> Result<String, RuntimeError>;

    /// Stop a container with a grace period, then remove it.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ContainerNotFound`] for unknown names.
    async fn stop(&self, name: &str) -> Result<(), RuntimeError>;

    /// List managed containers.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Runtime`] for daemon failures.
    async fn list(&self) -> Result<Vec<ContainerInfo>, RuntimeError>;

    /// Pull an image, verifying it is available.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::ImageNotFound`] if the pull fails.
    async fn pull(&self, image: &str) -> Result<(), RuntimeError>;
}

/// Production runtime over the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the local Docker daemon.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon socket is unreachable.
    pub fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Runtime(e.to_string()))?;
        Ok(Self { docker })
    }

    /// Pull the image if the daemon does not already have it.
    async fn ensure_image(&self, image: &str) -> Result<(), RuntimeError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(()),
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                tracing::info!(image, "Pulling image");
                self.pull(image).await
            }
            Err(e) => Err(RuntimeError::Runtime(e.to_string())),
        }
    }
}

/// Generate a container name for the given user.
fn generate_name(user_id: u64) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(10_000..=99_999);
    format!("compute_{user_id}_{suffix}")
}

/// Parse a `\d+[gm]` memory string into a byte limit.
fn memory_bytes(memory: &str) -> Option<i64> {
    let (digits, unit) = memory.split_at(memory.len().checked_sub(1)?);
    let amount: i64 = digits.parse().ok()?;
    match unit {
        "g" => amount.checked_mul(1024 * 1024 * 1024),
        "m" => amount.checked_mul(1024 * 1024),
        _ => None,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn start(&self, spec: &LaunchSpec) -> Result<String, RuntimeError> {
        self.ensure_image(&spec.image).await?;

        let memory = memory_bytes(&spec.memory)
            .ok_or_else(|| RuntimeError::Runtime(format!("bad memory limit: {}", spec.memory)))?;
        let port_key = format!("{}/tcp", spec.port);

        let mut labels = HashMap::new();
        labels.insert("managed_by".to_string(), MANAGED_BY_LABEL.to_string());
        labels.insert("user_id".to_string(), spec.user_id.to_string());

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            port_key.clone(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(spec.port.to_string()),
            }]),
        );

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(vec![
                format!("USER_ID={}", spec.user_id),
                format!("CONTAINER_PORT={}", spec.port),
            ]),
            labels: Some(labels),
            exposed_ports: Some(HashMap::from([(port_key, HashMap::new())])),
            host_config: Some(HostConfig {
                memory: Some(memory),
                // Whole cores: quota in microseconds per 100ms period.
                cpu_quota: Some(i64::from(spec.cpu) * 100_000),
                cpu_period: Some(100_000),
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        // A retried start after a lost response may collide with the
        // previous attempt's name; regenerate and try again.
        let mut last_error = None;
        for _ in 0..NAME_ATTEMPTS {
            let name = generate_name(spec.user_id);
            match self
                .docker
                .create_container(
                    Some(CreateContainerOptions {
                        name: name.as_str(),
                        platform: None,
                    }),
                    config.clone(),
                )
                .await
            {
                Ok(_) => {
                    self.docker
                        .start_container(&name, None::<StartContainerOptions<String>>)
                        .await
                        .map_err(|e| RuntimeError::Runtime(e.to_string()))?;
                    tracing::info!(container = %name, port = spec.port, "Container started");
                    return Ok(name);
                }
                Err(DockerError::DockerResponseServerError {
                    status_code: 409,
                    message,
                }) => {
                    tracing::warn!(container = %name, "Name collision, regenerating");
                    last_error = Some(RuntimeError::Runtime(message));
                }
                Err(e) => return Err(RuntimeError::Runtime(e.to_string())),
            }
        }

        Err(last_error
            .unwrap_or_else(|| RuntimeError::Runtime("container name collisions".to_string())))
    }

    async fn stop(&self, name: &str) -> Result<(), RuntimeError> {
        match self
            .docker
            .stop_container(name, Some(StopContainerOptions { t: STOP_GRACE_SECS }))
            .await
        {
            Ok(()) => {}
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => return Err(RuntimeError::ContainerNotFound(name.to_string())),
            Err(e) => return Err(RuntimeError::Runtime(e.to_string())),
        }

        match self
            .docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            // Already gone counts as removed.
            Ok(())
            | Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                tracing::info!(container = %name, "Container stopped");
                Ok(())
            }
            Err(e) => Err(RuntimeError::Runtime(e.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![format!("managed_by={MANAGED_BY_LABEL}")],
        );

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: false,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| RuntimeError::Runtime(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerInfo {
                id: c.id.unwrap_or_default().chars().take(12).collect(),
                name: c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                status: c.state.unwrap_or_default(),
                labels: c.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.docker
            .create_image(
                Some(CreateImageOptions {
                    from_image: image,
                    ..Default::default()
                }),
                None,
                None,
            )
            .try_collect::<Vec<_>>()
            .await
            .map_err(|_| RuntimeError::ImageNotFound(image.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_format_and_range() {
        for _ in 0..50 {
            let name = generate_name(42);
            let suffix = name.strip_prefix("compute_42_").unwrap();
            assert_eq!(suffix.len(), 5);
            let value: u32 = suffix.parse().unwrap();
            assert!((10_000..=99_999).contains(&value));
        }
    }

    #[test]
    fn memory_bytes_parsing() {
        assert_eq!(memory_bytes("4g"), Some(4 * 1024 * 1024 * 1024));
        assert_eq!(memory_bytes("512m"), Some(512 * 1024 * 1024));
        assert_eq!(memory_bytes("1g"), Some(1024 * 1024 * 1024));
        assert_eq!(memory_bytes("4gb"), None);
        assert_eq!(memory_bytes("g"), None);
        assert_eq!(memory_bytes(""), None);
    }
}
