//! Tool runtime manager
//!
//! Owns the registry, the tracked instance per tool, the per-tool lifecycle
//! locks, and host port reservations. Lifecycle operations on the same tool
//! are serialized; operations on different tools run concurrently.

use crate::driver::{ContainerDriver, LaunchSpec};
use crate::instance::{ToolInstance, ToolState, ToolStatusReport};
use crate::registry::ToolRegistry;
use crate::transport::{InvocationRequest, WorkerTransport};
use maestro_foundation::{config::RuntimeConfig, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

const LOG_TAIL_LINES: usize = 20;

/// Outcome of one tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResponse {
    /// Whether the worker reported success
    pub success: bool,

    /// Result payload, when successful
    pub result: Option<Value>,

    /// Error message, when not
    pub error: Option<String>,

    /// Wall-clock time spent on the call
    pub execution_time_seconds: f64,
}

/// Manages tool worker lifecycles and routes invocations
pub struct ToolRuntime {
    registry: ToolRegistry,
    driver: Arc<dyn ContainerDriver>,
    transport: Arc<dyn WorkerTransport>,
    instances: Arc<RwLock<HashMap<String, ToolInstance>>>,
    /// One lock per tool id, fixed at construction
    guards: HashMap<String, Arc<Mutex<()>>>,
    config: RuntimeConfig,
}

impl ToolRuntime {
    pub fn new(
        registry: ToolRegistry,
        driver: Arc<dyn ContainerDriver>,
        transport: Arc<dyn WorkerTransport>,
        config: RuntimeConfig,
    ) -> Self {
        let mut instances = HashMap::new();
        let mut guards = HashMap::new();
        for spec in registry.iter() {
            instances.insert(spec.id.clone(), ToolInstance::new(&spec.id));
            guards.insert(spec.id.clone(), Arc::new(Mutex::new(())));
        }

        Self {
            registry,
            driver,
            transport,
            instances: Arc::new(RwLock::new(instances)),
            guards,
            config,
        }
    }

    /// The registry behind this runtime
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// One "id: description" line per known tool
    pub fn capability_summary(&self) -> String {
        self.registry.capability_summary()
    }

    fn guard(&self, tool_id: &str) -> Result<Arc<Mutex<()>>> {
        self.guards
            .get(tool_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("tool '{}'", tool_id)))
    }

    /// Lowest free host port at or above the configured base.
    ///
    /// Must be called while holding the instances write lock so two
    /// concurrent starts cannot reserve the same port.
    fn reserve_port(&self, instances: &HashMap<String, ToolInstance>) -> u16 {
        let mut port = self.config.base_port;
        while instances.values().any(|i| i.port == Some(port)) {
            port += 1;
        }
        port
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Pull the tool's image. Idempotent: already-installed states are a no-op.
    pub async fn install(&self, tool_id: &str) -> Result<()> {
        let guard = self.guard(tool_id)?;
        let _lock = guard.lock().await;

        let state = {
            let instances = self.instances.read().await;
            instances[tool_id].state
        };

        match state {
            ToolState::Installed | ToolState::Running | ToolState::Stopped => {
                debug!(tool_id, "Already installed");
                return Ok(());
            }
            ToolState::Available | ToolState::Error => {}
        }

        let spec = self
            .registry
            .get(tool_id)
            .ok_or_else(|| Error::NotFound(format!("tool '{}'", tool_id)))?;

        info!(tool_id, image = %spec.image, "Installing tool");
        match self.driver.pull_image(&spec.image).await {
            Ok(()) => {
                let mut instances = self.instances.write().await;
                let instance = instances.get_mut(tool_id).unwrap();
                instance.state = ToolState::Installed;
                instance.last_error = None;
                Ok(())
            }
            Err(e) => {
                let mut instances = self.instances.write().await;
                let instance = instances.get_mut(tool_id).unwrap();
                instance.state = ToolState::Error;
                instance.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Start the tool's worker container.
    ///
    /// Requires Installed or Stopped. The host port is the lowest free port
    /// at or above the configured base.
    pub async fn start(&self, tool_id: &str, tool_config: HashMap<String, String>) -> Result<u16> {
        let guard = self.guard(tool_id)?;
        let _lock = guard.lock().await;

        let spec = self
            .registry
            .get(tool_id)
            .ok_or_else(|| Error::NotFound(format!("tool '{}'", tool_id)))?;

        // Reserve the port while still holding the map lock
        let port = {
            let mut instances = self.instances.write().await;
            let instance = instances.get_mut(tool_id).unwrap();
            match instance.state {
                ToolState::Installed | ToolState::Stopped => {}
                other => {
                    return Err(Error::invalid_state(
                        format!("tool '{}'", tool_id),
                        other.to_string(),
                        "start",
                    ));
                }
            }
            let port = self.reserve_port(&instances);
            let instance = instances.get_mut(tool_id).unwrap();
            instance.port = Some(port);
            port
        };

        // Environment: config keys become UPPER_SNAKE variables
        let env: HashMap<String, String> = tool_config
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();

        let launch = LaunchSpec {
            name: format!("maestro-{}-{}", tool_id, chrono::Utc::now().timestamp()),
            image: spec.image.clone(),
            port,
            env,
            network: self.config.network_name.clone(),
        };

        self.driver.ensure_network(&self.config.network_name).await?;

        info!(tool_id, port, "Starting tool worker");
        match self.driver.launch(&launch).await {
            Ok(container_id) => {
                let mut instances = self.instances.write().await;
                let instance = instances.get_mut(tool_id).unwrap();
                instance.state = ToolState::Running;
                instance.container_id = Some(container_id);
                instance.last_error = None;
                Ok(port)
            }
            Err(e) => {
                let mut instances = self.instances.write().await;
                let instance = instances.get_mut(tool_id).unwrap();
                instance.state = ToolState::Error;
                instance.last_error = Some(e.to_string());
                instance.release();
                Err(e)
            }
        }
    }

    /// Stop the tool's worker and return it to `Installed`. A no-op when
    /// the tool is not running.
    pub async fn stop(&self, tool_id: &str) -> Result<()> {
        let guard = self.guard(tool_id)?;
        let _lock = guard.lock().await;

        let container_id = {
            let instances = self.instances.read().await;
            let instance = &instances[tool_id];
            if !instance.is_running() {
                debug!(tool_id, "Not running, nothing to stop");
                return Ok(());
            }
            instance.container_id.clone()
        };

        info!(tool_id, "Stopping tool worker");
        let result = match &container_id {
            Some(id) => {
                let stopped = self
                    .driver
                    .stop(id, self.config.stop_timeout_secs as u32)
                    .await;
                if stopped.is_ok() {
                    let _ = self.driver.remove(id).await;
                }
                stopped
            }
            None => Ok(()),
        };

        let mut instances = self.instances.write().await;
        let instance = instances.get_mut(tool_id).unwrap();
        match result {
            Ok(()) => {
                // The image stays pulled, so a stopped worker is just installed
                instance.state = ToolState::Installed;
                instance.last_error = None;
                instance.release();
                Ok(())
            }
            Err(e) => {
                instance.state = ToolState::Error;
                instance.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Stop every running tool. Failures are logged, not propagated.
    pub async fn shutdown(&self) {
        let running: Vec<String> = {
            let instances = self.instances.read().await;
            instances
                .values()
                .filter(|i| i.is_running())
                .map(|i| i.tool_id.clone())
                .collect()
        };

        for tool_id in running {
            if let Err(e) = self.stop(&tool_id).await {
                warn!(tool_id, error = %e, "Failed to stop tool during shutdown");
            }
        }
    }

    // ========================================================================
    // Invocation
    // ========================================================================

    /// Route one method call to a running tool's worker.
    ///
    /// Unknown tools and non-running tools are hard errors; a worker-side
    /// failure comes back as a response with `success = false`.
    pub async fn invoke(
        &self,
        tool_id: &str,
        method: &str,
        params: Value,
        agent_id: &str,
        task_id: Option<String>,
    ) -> Result<InvocationResponse> {
        if !self.registry.contains(tool_id) {
            return Err(Error::NotFound(format!("tool '{}'", tool_id)));
        }

        let port = {
            let instances = self.instances.read().await;
            let instance = &instances[tool_id];
            if !instance.is_running() {
                return Err(Error::ToolNotRunning(tool_id.to_string()));
            }
            instance.port.ok_or_else(|| {
                Error::Internal(format!("running tool '{}' has no port", tool_id))
            })?
        };

        let request = InvocationRequest {
            tool_id: tool_id.to_string(),
            method: method.to_string(),
            params,
            agent_id: agent_id.to_string(),
            task_id,
        };

        let started = Instant::now();
        debug!(tool_id, method, "Invoking tool");

        let response = match self.transport.invoke(port, &request).await {
            Ok(reply) => InvocationResponse {
                success: reply.success,
                result: reply.result,
                error: reply.error,
                execution_time_seconds: started.elapsed().as_secs_f64(),
            },
            Err(e) => InvocationResponse {
                success: false,
                result: None,
                error: Some(e.to_string()),
                execution_time_seconds: started.elapsed().as_secs_f64(),
            },
        };

        Ok(response)
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Detailed status for one tool, including the container's live state
    pub async fn status(&self, tool_id: &str) -> Result<ToolStatusReport> {
        let spec = self
            .registry
            .get(tool_id)
            .ok_or_else(|| Error::NotFound(format!("tool '{}'", tool_id)))?;

        let instance = {
            let instances = self.instances.read().await;
            instances[tool_id].clone()
        };

        let (container_state, recent_logs) = match &instance.container_id {
            Some(id) if instance.is_running() => {
                let state = self
                    .driver
                    .state(id)
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                let logs = self.driver.logs(id, LOG_TAIL_LINES).await.ok();
                (state, logs)
            }
            _ => ("unknown".to_string(), None),
        };

        Ok(ToolStatusReport {
            tool_id: instance.tool_id,
            name: spec.name.clone(),
            state: instance.state,
            port: instance.port,
            container_id: instance.container_id,
            container_state,
            recent_logs,
            last_error: instance.last_error,
        })
    }

    /// Snapshot of every tracked instance, sorted by tool id
    pub async fn list(&self) -> Vec<ToolInstance> {
        let instances = self.instances.read().await;
        let mut all: Vec<ToolInstance> = instances.values().cloned().collect();
        all.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        all
    }

    /// Tail of a running tool's worker log
    pub async fn logs(&self, tool_id: &str, tail: usize) -> Result<String> {
        if !self.registry.contains(tool_id) {
            return Err(Error::NotFound(format!("tool '{}'", tool_id)));
        }

        let container_id = {
            let instances = self.instances.read().await;
            instances[tool_id]
                .container_id
                .clone()
                .ok_or_else(|| Error::ToolNotRunning(tool_id.to_string()))?
        };

        self.driver.logs(&container_id, tail).await
    }
}
