//! # maestro-foundation
//!
//! Foundation layer for Maestro:
//! - Error: central error type shared by every layer
//! - Config: TOML configuration for gateway, runtime and engine
//! - Types: chat messages, generation options, progress events
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  maestro-engine (task state machine, planning, steps)   │
//! │            │                          │                 │
//! │            ▼                          ▼                 │
//! │  maestro-gateway              maestro-runtime           │
//! │  (reasoning model)            (tool workers, ports)     │
//! │            │                          │                 │
//! │            └──────────┬───────────────┘                 │
//! │                       ▼                                 │
//! │            maestro-foundation (this crate)              │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod types;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    EngineConfig, GatewayConfig, MaestroConfig, RuntimeConfig, MAESTRO_CONFIG_FILE,
};

// ============================================================================
// Types
// ============================================================================
pub use types::{
    ChatMessage, Completion, GenerationOptions, MessageRole, ProgressUpdate, TaskOutcome,
    TokenUsage,
};
