//! Errors returned by the control loop.

use actloop_core::error::{ErrorKind, ProviderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The model service failed for the current step. Never retried.
    #[error("Model service unavailable: {0}")]
    ModelUnavailable(#[source] ProviderError),

    #[error("Transcript has no user message to respond to")]
    EmptyTranscript,
}

impl AgentError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::ModelUnavailable(e) => Some(e.kind()),
            Self::EmptyTranscript => None,
        }
    }
}
