//! HTTP surface of the agent.
//!
//! Five endpoints, all JSON: health, container start/stop/list, and a
//! diagnostic image-pull check. Error bodies are `{"error": <string>}` with
//! the mapping: unknown image → 400, unknown container → 404, daemon
//! failure → 500.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use tower_http::trace::TraceLayer;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::runtime::{ContainerRuntime, LaunchSpec};

/// Shared state for the agent's handlers.
pub struct AgentState<R>
where
    R: ContainerRuntime,
{
    /// The container runtime.
    pub runtime: Arc<R>,
    /// Agent configuration.
    pub config: AgentConfig,
}

impl<R> Clone for AgentState<R>
where
    R: ContainerRuntime,
{
    fn clone(&self) -> Self {
        Self {
            runtime: Arc::clone(&self.runtime),
            config: self.config.clone(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Advertised host name.
    pub host: String,
    /// Host CPU usage percentage.
    pub cpu_percent: f32,
    /// Host memory usage percentage.
    pub memory_percent: f64,
}

/// Request body for starting a container.
#[derive(Debug, Deserialize)]
pub struct StartBody {
    /// Image to run; required.
    #[serde(default)]
    pub image: Option<String>,
    /// CPU cores to grant.
    #[serde(default = "default_cpu")]
    pub cpu: u32,
    /// Memory limit (e.g. `"4g"`).
    #[serde(default = "default_memory")]
    pub memory: String,
    /// Host port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Booking owner.
    pub user_id: u64,
}

const fn default_cpu() -> u32 {
    1
}

fn default_memory() -> String {
    "2g".to_string()
}

const fn default_port() -> u16 {
    8888
}

/// Response for a successful container start.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    /// Name the container was created under.
    pub container_name: String,
    /// URL the session is reachable at.
    pub url: String,
    /// Bound port.
    pub port: u16,
}

/// Report host health and utilization.
#[allow(clippy::cast_precision_loss)]
pub async fn health<R>(State(state): State<AgentState<R>>) -> impl IntoResponse
where
    R: ContainerRuntime + 'static,
{
    let mut sys = System::new();
    sys.refresh_cpu();
    sys.refresh_memory();

    let memory_percent = if sys.total_memory() > 0 {
        sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0
    } else {
        0.0
    };

    Json(HealthResponse {
        status: "ok",
        host: state.config.advertised_host.clone(),
        cpu_percent: sys.global_cpu_info().cpu_usage(),
        memory_percent,
    })
}

/// Start a session container with resource limits.
///
/// # Errors
///
/// Returns 400 for a missing or unknown image, 500 for daemon failures.
pub async fn start_container<R>(
    State(state): State<AgentState<R>>,
    Json(body): Json<StartBody>,
) -> Result<impl IntoResponse, AgentError>
where
    R: ContainerRuntime + 'static,
{
    let image = body.image.filter(|i| !i.is_empty()).ok_or(AgentError::MissingImage)?;

    let spec = LaunchSpec {
        user_id: body.user_id,
        image,
        cpu: body.cpu,
        memory: body.memory,
        port: body.port,
    };

    let container_name = state.runtime.start(&spec).await?;
    let url = format!("http://{}:{}", state.config.advertised_host, spec.port);

    Ok(Json(StartResponse {
        container_name,
        url,
        port: spec.port,
    }))
}

/// Stop and remove a container.
///
/// # Errors
///
/// Returns 404 for unknown container names.
pub async fn stop_container<R>(
    State(state): State<AgentState<R>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AgentError>
where
    R: ContainerRuntime + 'static,
{
    state.runtime.stop(&name).await?;

    Ok(Json(serde_json::json!({
        "msg": "Container stopped",
        "name": name,
    })))
}

/// List all managed containers.
///
/// # Errors
///
/// Returns 500 for daemon failures.
pub async fn list_containers<R>(
    State(state): State<AgentState<R>>,
) -> Result<impl IntoResponse, AgentError>
where
    R: ContainerRuntime + 'static,
{
    let containers = state.runtime.list().await?;
    Ok(Json(containers))
}

/// Pull an image to verify it is available. Diagnostic only.
///
/// # Errors
///
/// Returns 400 if the pull fails.
pub async fn test_image<R>(
    State(state): State<AgentState<R>>,
    Path(image): Path<String>,
) -> Result<impl IntoResponse, AgentError>
where
    R: ContainerRuntime + 'static,
{
    state.runtime.pull(&image).await?;

    Ok(Json(serde_json::json!({
        "msg": format!("Image {image} available"),
    })))
}

/// Create the agent router.
pub fn create_router<R>(state: AgentState<R>) -> Router
where
    R: ContainerRuntime + 'static,
{
    Router::new()
        .route("/health", get(health::<R>))
        .route("/start_container", post(start_container::<R>))
        .route("/stop_container/:name", post(stop_container::<R>))
        .route("/containers", get(list_containers::<R>))
        .route("/test_image/:image", post(test_image::<R>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerInfo, RuntimeError};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Runtime double: starts anything except `missing/image`, knows one
    /// container named `compute_7_11111`.
    struct MockRuntime {
        stopped: Mutex<Vec<String>>,
        pulled: Mutex<Vec<String>>,
    }

    impl MockRuntime {
        fn new() -> Self {
            Self {
                stopped: Mutex::new(Vec::new()),
                pulled: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn start(&self, spec: &LaunchSpec) -> Result<String, RuntimeError> {
            if spec.image == "missing/image" {
                return Err(RuntimeError::ImageNotFound(spec.image.clone()));
            }
            Ok(format!("compute_{}_12345", spec.user_id))
        }

        async fn stop(&self, name: &str) -> Result<(), RuntimeError> {
            if name == "compute_7_11111" {
                self.stopped.lock().unwrap().push(name.to_string());
                Ok(())
            } else {
                Err(RuntimeError::ContainerNotFound(name.to_string()))
            }
        }

        async fn list(&self) -> Result<Vec<ContainerInfo>, RuntimeError> {
            Ok(vec![ContainerInfo {
                id: "abcdef012345".into(),
                name: "compute_7_11111".into(),
                status: "running".into(),
                labels: HashMap::from([
                    ("managed_by".to_string(), "compute_booking".to_string()),
                    ("user_id".to_string(), "7".to_string()),
                ]),
            }])
        }

        async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
            if image == "bad" {
                return Err(RuntimeError::ImageNotFound(image.to_string()));
            }
            self.pulled.lock().unwrap().push(image.to_string());
            Ok(())
        }
    }

    fn test_server() -> (TestServer, Arc<MockRuntime>) {
        let runtime = Arc::new(MockRuntime::new());
        let state = AgentState {
            runtime: Arc::clone(&runtime),
            config: AgentConfig {
                advertised_host: "worker-1".into(),
                listen_addr: "0.0.0.0:5000".into(),
            },
        };
        (TestServer::new(create_router(state)).unwrap(), runtime)
    }

    #[tokio::test]
    async fn health_reports_host() {
        let (server, _) = test_server();
        let response = server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["host"], "worker-1");
        assert!(body["memory_percent"].is_number());
    }

    #[tokio::test]
    async fn start_returns_container_coordinates() {
        let (server, _) = test_server();
        let response = server
            .post("/start_container")
            .json(&json!({
                "image": "jupyter/notebook",
                "cpu": 2,
                "memory": "4g",
                "port": 8042,
                "user_id": 7,
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["container_name"], "compute_7_12345");
        assert_eq!(body["url"], "http://worker-1:8042");
        assert_eq!(body["port"], 8042);
    }

    #[tokio::test]
    async fn start_without_image_is_bad_request() {
        let (server, _) = test_server();
        let response = server
            .post("/start_container")
            .json(&json!({ "user_id": 7 }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["error"], "Missing image parameter");
    }

    #[tokio::test]
    async fn start_with_unknown_image_is_bad_request() {
        let (server, _) = test_server();
        let response = server
            .post("/start_container")
            .json(&json!({ "image": "missing/image", "user_id": 7 }))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("Image not found"));
    }

    #[tokio::test]
    async fn stop_known_container_succeeds() {
        let (server, runtime) = test_server();
        let response = server.post("/stop_container/compute_7_11111").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["name"], "compute_7_11111");
        assert_eq!(runtime.stopped.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_unknown_container_is_not_found() {
        let (server, _) = test_server();
        let response = server.post("/stop_container/ghost").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert_eq!(body["error"], "Container not found");
    }

    #[tokio::test]
    async fn containers_lists_managed() {
        let (server, _) = test_server();
        let response = server.get("/containers").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "compute_7_11111");
        assert_eq!(list[0]["id"], "abcdef012345");
        assert_eq!(list[0]["labels"]["managed_by"], "compute_booking");
    }

    #[tokio::test]
    async fn test_image_pull_outcomes() {
        let (server, runtime) = test_server();

        let response = server.post("/test_image/python").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(runtime.pulled.lock().unwrap().as_slice(), ["python"]);

        let response = server.post("/test_image/bad").await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    }
}
