//! Error types for the MongoDB MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Every variant renders to a single human-readable message; tool calls never surface
//! these as protocol errors, they are turned into `"Error: <message>"` text payloads
//! by the response envelope (see `tools::response`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Not connected to MongoDB. Please use 'connect' tool first.")]
    NotConnected,

    #[error("No connection string provided and MONGODB_URI not set in environment.")]
    MissingConfiguration,

    #[error("Server is in READ-ONLY mode: {operation} is not allowed.")]
    ReadOnlyViolation { operation: String },

    #[error("Failed to connect: {message}")]
    ConnectionFailed { message: String },

    /// Driver-level fault, message passed through verbatim.
    #[error("{message}")]
    OperationFailed { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a read-only violation for the given operation.
    pub fn read_only(operation: impl Into<String>) -> Self {
        Self::ReadOnlyViolation {
            operation: operation.into(),
        }
    }

    /// Create a connection failure error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create an operation failure carrying the driver's message.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Short machine-friendly name of the variant, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConnected => "not_connected",
            Self::MissingConfiguration => "missing_configuration",
            Self::ReadOnlyViolation { .. } => "read_only_violation",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::OperationFailed { .. } => "operation_failed",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Internal { .. } => "internal",
        }
    }
}

/// Convert driver errors to GatewayError.
impl From<mongodb::error::Error> for GatewayError {
    fn from(err: mongodb::error::Error) -> Self {
        GatewayError::operation_failed(err.to_string())
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
