//! Container driver - runs tool workers in Docker containers
//!
//! The manager talks to a `ContainerDriver` trait so tests can swap in a
//! fake. `DockerDriver` is the real implementation on top of bollard.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::network::CreateNetworkOptions;
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use futures::StreamExt;
use maestro_foundation::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Everything needed to launch one worker container
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Container name
    pub name: String,

    /// Image to run
    pub image: String,

    /// Host port mapped to the worker's service port
    pub port: u16,

    /// Environment variables
    pub env: HashMap<String, String>,

    /// Network to attach to
    pub network: String,
}

/// Interface to a container runtime
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    /// Whether the runtime is reachable
    async fn is_available(&self) -> bool;

    /// Create the named network if it does not exist
    async fn ensure_network(&self, name: &str) -> Result<()>;

    /// Pull an image
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// Create and start a container, returning its id
    async fn launch(&self, spec: &LaunchSpec) -> Result<String>;

    /// Stop a container, waiting up to `timeout_secs` before killing it
    async fn stop(&self, container_id: &str, timeout_secs: u32) -> Result<()>;

    /// Force-remove a container
    async fn remove(&self, container_id: &str) -> Result<()>;

    /// Live state string of a container ("running", "exited", ...)
    async fn state(&self, container_id: &str) -> Result<String>;

    /// Tail of a container's combined stdout/stderr log
    async fn logs(&self, container_id: &str, tail: usize) -> Result<String>;
}

/// Container driver backed by the local Docker daemon
pub struct DockerDriver {
    docker: Docker,
}

impl DockerDriver {
    /// Connect with local defaults (socket or named pipe)
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::tool_lifecycle("docker", format!("connect failed: {}", e)))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerDriver for DockerDriver {
    async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    async fn ensure_network(&self, name: &str) -> Result<()> {
        let existing = self
            .docker
            .list_networks::<String>(None)
            .await
            .map_err(|e| Error::tool_lifecycle("docker", format!("list networks: {}", e)))?;

        if existing
            .iter()
            .any(|n| n.name.as_deref() == Some(name))
        {
            return Ok(());
        }

        debug!(network = name, "Creating network");
        self.docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::tool_lifecycle("docker", format!("create network: {}", e)))?;
        Ok(())
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        debug!(image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| {
                Error::tool_lifecycle("docker", format!("pull {}: {}", image, e))
            })?;
        }
        Ok(())
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<String> {
        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();

        // Map the host port to the worker's fixed service port inside
        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            "8080/tcp".to_string(),
            Some(vec![PortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: Some(spec.port.to_string()),
            }]),
        );

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(env),
            host_config: Some(HostConfig {
                port_bindings: Some(port_bindings),
                network_mode: Some(spec.network.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| Error::tool_lifecycle("docker", format!("create container: {}", e)))?;

        if let Err(e) = self
            .docker
            .start_container(&response.id, None::<StartContainerOptions<String>>)
            .await
        {
            // Don't leave a created-but-dead container behind
            let _ = self.remove(&response.id).await;
            return Err(Error::tool_lifecycle(
                "docker",
                format!("start container: {}", e),
            ));
        }

        Ok(response.id)
    }

    async fn stop(&self, container_id: &str, timeout_secs: u32) -> Result<()> {
        self.docker
            .stop_container(
                container_id,
                Some(StopContainerOptions {
                    t: timeout_secs as i64,
                }),
            )
            .await
            .map_err(|e| Error::tool_lifecycle("docker", format!("stop container: {}", e)))?;
        Ok(())
    }

    async fn remove(&self, container_id: &str) -> Result<()> {
        self.docker
            .remove_container(
                container_id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| Error::tool_lifecycle("docker", format!("remove container: {}", e)))?;
        Ok(())
    }

    async fn state(&self, container_id: &str) -> Result<String> {
        let inspect = self
            .docker
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| Error::tool_lifecycle("docker", format!("inspect container: {}", e)))?;

        let state = inspect
            .state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(state)
    }

    async fn logs(&self, container_id: &str, tail: usize) -> Result<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.logs(container_id, Some(options));
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(log) => out.push_str(&String::from_utf8_lossy(&log.into_bytes())),
                Err(e) => {
                    warn!(container_id, error = %e, "Log stream ended with error");
                    break;
                }
            }
        }
        Ok(out)
    }
}
