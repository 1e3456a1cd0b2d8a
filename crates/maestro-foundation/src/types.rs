//! Shared types - chat messages, generation options, progress events
//!
//! These types cross crate boundaries: the engine builds `ChatMessage` lists
//! for the gateway and emits `ProgressUpdate`/`TaskOutcome` events toward the
//! push layer. Nothing here has behavior beyond construction and clamping.

use serde::{Deserialize, Serialize};

// ============================================================================
// Chat Messages
// ============================================================================

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A single role-tagged message sent to the reasoning-model gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ============================================================================
// Generation Options
// ============================================================================

/// Sampling parameters for a gateway request
///
/// Values outside the contract ranges are clamped rather than rejected:
/// temperature to [0, 2], max_tokens to [1, 32000].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

impl GenerationOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
        .clamped()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self.clamped()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self.clamped()
    }

    fn clamped(mut self) -> Self {
        self.temperature = self.temperature.clamp(0.0, 2.0);
        self.max_tokens = self.max_tokens.clamp(1, 32_000);
        self
    }
}

// ============================================================================
// Gateway Response
// ============================================================================

/// Token accounting reported by the gateway
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A successful gateway completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text
    pub content: String,

    /// Token accounting
    pub usage: TokenUsage,

    /// Wall-clock time of the request
    pub response_time_seconds: f64,
}

// ============================================================================
// Progress Events
// ============================================================================

/// Progress update emitted after every step and at task creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Task identifier (string form, stable across the wire)
    pub task_id: String,

    /// Completion percentage, 0-100, non-decreasing per task
    pub progress: f32,

    /// Name of the step currently executing, if any
    pub current_step: Option<String>,
}

/// Terminal event emitted exactly once per task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: String,

    /// Terminal status as a lowercase string (completed/failed/cancelled)
    pub status: String,

    /// Result payload, set on completion
    pub result: Option<serde_json::Value>,

    /// Error message, set on failure
    pub error: Option<String>,
}
