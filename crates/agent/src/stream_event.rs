//! Loop-level streaming events.
//!
//! `LoopEvent` wraps provider stream chunks and dispatch progress into
//! events a transport (SSE, WebSocket) can forward to clients as-is.

use actloop_core::error::ErrorKind;
use serde::{Deserialize, Serialize};

use crate::dispatcher::DispatchOutcome;
use crate::state::TerminationReason;

/// Events emitted while a conversation runs:
/// - `model_chunk`: partial text from the model
/// - `tool_started`: a call passed parsing and is being dispatched
/// - `tool_finished`: the tool result was appended
/// - `terminated` : the loop stopped; always the last event
/// - `error`      : the model service failed; followed by `terminated`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    ModelChunk { content: String },

    ToolStarted {
        call_id: String,
        name: String,
        input: serde_json::Value,
    },

    ToolFinished {
        call_id: String,
        name: String,
        output: String,
        outcome: DispatchOutcome,
    },

    Terminated {
        conversation_id: String,
        reason: TerminationReason,
        final_message: String,
        iterations: u32,
        tool_calls_made: u32,
    },

    Error { kind: ErrorKind, message: String },
}

impl LoopEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ModelChunk { .. } => "model_chunk",
            Self::ToolStarted { .. } => "tool_started",
            Self::ToolFinished { .. } => "tool_finished",
            Self::Terminated { .. } => "terminated",
            Self::Error { .. } => "error",
        }
    }
}
