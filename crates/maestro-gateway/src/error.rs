//! Gateway-specific errors
//!
//! Converted into the foundation `Error::Gateway` at the crate boundary so
//! callers outside this crate only ever see the central taxonomy.

use thiserror::Error;

/// Errors raised by a reasoning-model gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Could not reach the model server
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status
    #[error("Server error: {0}")]
    ServerError(String),

    /// The requested model is not present on the server
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for maestro_foundation::Error {
    fn from(e: GatewayError) -> Self {
        maestro_foundation::Error::Gateway(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_foundation_error() {
        let err: maestro_foundation::Error = GatewayError::Network("refused".into()).into();
        assert!(matches!(err, maestro_foundation::Error::Gateway(_)));
        assert!(err.to_string().contains("refused"));
    }
}
