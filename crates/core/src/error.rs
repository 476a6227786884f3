//! Error types for the actloop domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`ErrorKind`] classifies
//! the failures the control loop reports to callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all actloop operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Registry errors ---
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classes surfaced by the control loop.
///
/// `ToolNotFound` is listed here for reporting even though it is a valid
/// business outcome rather than a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An action line was present but its arguments could not be used.
    ParseMalformed,
    /// The model named a tool that is not registered.
    UnknownTool,
    /// Arguments failed validation against the tool's parameter schema.
    SchemaMismatch,
    /// The tool handler failed unexpectedly.
    ToolExecutionFault,
    /// The tool ran and reported that nothing matched.
    ToolNotFound,
    /// The model service could not be reached or failed mid-response.
    ModelServiceUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseMalformed => "parse_malformed",
            Self::UnknownTool => "unknown_tool",
            Self::SchemaMismatch => "schema_mismatch",
            Self::ToolExecutionFault => "tool_execution_fault",
            Self::ToolNotFound => "tool_not_found",
            Self::ModelServiceUnavailable => "model_service_unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Every provider failure means the model service is unavailable for
    /// the current step; the loop never retries.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ModelServiceUnavailable
    }
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ExecutionFailed { .. } => ErrorKind::ToolExecutionFault,
            Self::InvalidArguments(_) => ErrorKind::SchemaMismatch,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Invalid tool name: {0:?}")]
    InvalidName(String),
}
