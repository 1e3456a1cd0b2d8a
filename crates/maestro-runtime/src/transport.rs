//! Worker transport - HTTP invocation of running tool workers
//!
//! Workers expose a single `/invoke` endpoint on their mapped host port.
//! The request carries the method name and parameters verbatim; the worker
//! answers with a success flag and either a result payload or an error.

use async_trait::async_trait;
use maestro_foundation::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const INVOKE_TIMEOUT_SECS: u64 = 120;

/// Request body sent to a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Tool being invoked
    pub tool_id: String,

    /// Method name, passed through verbatim
    pub method: String,

    /// Method parameters, passed through verbatim
    pub params: Value,

    /// Identity of the calling agent
    pub agent_id: String,

    /// Task the call belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Response body returned by a worker
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerReply {
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Interface to a worker endpoint
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// Send one invocation to the worker on the given host port
    async fn invoke(&self, port: u16, request: &InvocationRequest) -> Result<WorkerReply>;
}

/// HTTP transport to workers on localhost
pub struct HttpWorkerTransport {
    client: Client,
}

impl HttpWorkerTransport {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(INVOKE_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Default for HttpWorkerTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerTransport for HttpWorkerTransport {
    async fn invoke(&self, port: u16, request: &InvocationRequest) -> Result<WorkerReply> {
        let url = format!("http://127.0.0.1:{}/invoke", port);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                Error::tool_lifecycle(&request.tool_id, format!("worker unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::tool_lifecycle(
                &request.tool_id,
                format!("worker returned {}: {}", status, body),
            ));
        }

        let reply: WorkerReply = response.json().await.map_err(|e| {
            Error::tool_lifecycle(&request.tool_id, format!("bad worker reply: {}", e))
        })?;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_skips_empty_task() {
        let request = InvocationRequest {
            tool_id: "filesystem".into(),
            method: "read_file".into(),
            params: json!({"path": "/tmp/a"}),
            agent_id: "agent-1".into(),
            task_id: None,
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["method"], "read_file");
        assert!(body.get("task_id").is_none());
    }

    #[test]
    fn test_reply_parsing() {
        let ok: WorkerReply =
            serde_json::from_str(r#"{"success":true,"result":{"lines":3}}"#).unwrap();
        assert!(ok.success);
        assert_eq!(ok.result.unwrap()["lines"], 3);

        let err: WorkerReply =
            serde_json::from_str(r#"{"success":false,"error":"denied"}"#).unwrap();
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("denied"));
    }
}
