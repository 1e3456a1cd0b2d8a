//! # maestro-gateway
//!
//! Reasoning-model gateway abstraction. The engine talks to one trait:
//! a role-tagged message list plus sampling options in, generated text plus
//! token usage out. Synchronous request/response, no internal retry - the
//! engine owns its own fallback chains and a retry here would double up
//! with them.

pub mod error;
pub mod ollama;

pub use error::GatewayError;
pub use ollama::OllamaGateway;

use async_trait::async_trait;
use maestro_foundation::{ChatMessage, Completion, GenerationOptions};

/// Interface to a reasoning model
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Generate a completion for an ordered message list
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: GenerationOptions,
    ) -> Result<Completion, GatewayError>;

    /// Check whether the backing model server is reachable
    async fn health_check(&self) -> bool;
}
