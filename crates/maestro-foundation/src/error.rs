//! Error types for Maestro
//!
//! All errors are managed centrally. Lifecycle operations surface these
//! synchronously to their caller; task execution never lets one escape its
//! own boundary (a task always ends in a terminal status instead).

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Maestro error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lookup / state
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: cannot {operation} {entity} while {status}")]
    InvalidState {
        entity: String,
        status: String,
        operation: String,
    },

    // ========================================================================
    // Task execution
    // ========================================================================
    #[error("Planning failed: {0}")]
    Planning(String),

    #[error("Step execution failed: {step} - {message}")]
    StepExecution { step: String, message: String },

    // ========================================================================
    // Tool runtime
    // ========================================================================
    #[error("Tool lifecycle error: {tool} - {message}")]
    ToolLifecycle { tool: String, message: String },

    #[error("Tool not running: {0}")]
    ToolNotRunning(String),

    // ========================================================================
    // Reasoning-model gateway
    // ========================================================================
    #[error("Gateway error: {0}")]
    Gateway(String),

    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 재시도 가능한 에러인지 확인
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Gateway(_) | Error::ToolNotRunning(_))
    }

    /// InvalidState 생성 헬퍼
    pub fn invalid_state(
        entity: impl Into<String>,
        status: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Error::InvalidState {
            entity: entity.into(),
            status: status.into(),
            operation: operation.into(),
        }
    }

    /// StepExecution 생성 헬퍼
    pub fn step_execution(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StepExecution {
            step: step.into(),
            message: message.into(),
        }
    }

    /// ToolLifecycle 생성 헬퍼
    pub fn tool_lifecycle(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolLifecycle {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(Error::Gateway("timeout".into()).is_retryable());
        assert!(!Error::NotFound("task".into()).is_retryable());
    }

    #[test]
    fn test_invalid_state_message() {
        let err = Error::invalid_state("task abc", "completed", "cancel");
        assert_eq!(
            err.to_string(),
            "Invalid state: cannot cancel task abc while completed"
        );
    }
}
