//! Dispatcher: validates and executes one recognized tool call.
//!
//! Every dispatch appends exactly one tool-result message to the
//! transcript, whatever the outcome. The only exception is a name that is
//! not registered: that is rejected before anything is appended.

use actloop_core::error::{ErrorKind, ToolError};
use actloop_core::message::{Message, Transcript};
use actloop_core::tool::{Arguments, ToolOutput, ToolRegistry, ToolSpec};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::parser::ActionCall;

/// How a dispatched call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Success,
    /// The tool ran and found nothing. Not a failure.
    NotFound,
    /// Arguments did not match the tool's schema; the handler did not run.
    SchemaMismatch,
    ExecutionFault,
}

impl DispatchOutcome {
    /// Whether the failure policy applies.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::SchemaMismatch | Self::ExecutionFault)
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success => None,
            Self::NotFound => Some(ErrorKind::ToolNotFound),
            Self::SchemaMismatch => Some(ErrorKind::SchemaMismatch),
            Self::ExecutionFault => Some(ErrorKind::ToolExecutionFault),
        }
    }
}

/// Record of a completed dispatch.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Arguments,
    pub outcome: DispatchOutcome,
    /// Exactly what was appended as the tool-result content
    pub content: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Tool not registered: {0}")]
    UnknownTool(String),
}

pub struct Dispatcher<'a> {
    registry: &'a ToolRegistry,
}

impl<'a> Dispatcher<'a> {
    pub fn new(registry: &'a ToolRegistry) -> Self {
        Self { registry }
    }

    /// Execute `call` and append its result to `transcript`.
    ///
    /// The transcript is untouched until the handler has finished, so
    /// dropping this future mid-call leaves no partial entry behind.
    pub async fn dispatch(
        &self,
        call: &ActionCall,
        transcript: &mut Transcript,
    ) -> Result<DispatchRecord, DispatchError> {
        let tool = self
            .registry
            .get(&call.tool_name)
            .ok_or_else(|| DispatchError::UnknownTool(call.tool_name.clone()))?;

        let call_id = call
            .call_id
            .clone()
            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));

        let start = Instant::now();
        let (outcome, content) = match validate_arguments(tool.spec(), &call.arguments) {
            Err(reason) => {
                warn!(tool = %call.tool_name, %reason, "Tool arguments rejected");
                (
                    DispatchOutcome::SchemaMismatch,
                    format!("Error: invalid arguments for '{}': {reason}", call.tool_name),
                )
            }
            Ok(()) => match tool.execute(&call.arguments).await {
                Ok(ToolOutput::Value(text)) => (DispatchOutcome::Success, text),
                Ok(ToolOutput::NotFound(text)) => (DispatchOutcome::NotFound, text),
                Err(e) => {
                    warn!(tool = %call.tool_name, error = %e, "Tool execution failed");
                    (fault_outcome(&e), format!("Error: {e}"))
                }
            },
        };
        let duration = start.elapsed();

        debug!(
            tool = %call.tool_name,
            call_id = %call_id,
            ?outcome,
            duration_ms = duration.as_millis() as u64,
            "Tool dispatched"
        );

        transcript.push(Message::tool_result(&call.tool_name, &call_id, &content));

        Ok(DispatchRecord {
            call_id,
            tool_name: call.tool_name.clone(),
            arguments: call.arguments.clone(),
            outcome,
            content,
            duration,
        })
    }
}

fn fault_outcome(err: &ToolError) -> DispatchOutcome {
    match err.kind() {
        ErrorKind::SchemaMismatch => DispatchOutcome::SchemaMismatch,
        _ => DispatchOutcome::ExecutionFault,
    }
}

/// Check arguments against a tool's declared parameters.
///
/// Required parameters must be present, undeclared ones are refused, and
/// each value must already have the declared JSON type.
pub fn validate_arguments(spec: &ToolSpec, arguments: &Arguments) -> Result<(), String> {
    for param in &spec.params {
        match arguments.get(&param.name) {
            None if param.required => {
                return Err(format!("missing required parameter '{}'", param.name));
            }
            None => {}
            Some(value) if !param.ty.accepts(value) => {
                return Err(format!(
                    "parameter '{}' must be {} but got {}",
                    param.name,
                    param.ty,
                    json_type(value)
                ));
            }
            Some(_) => {}
        }
    }

    if let Some(extra) = arguments.keys().find(|k| spec.param(k).is_none()) {
        return Err(format!("unexpected parameter '{extra}'"));
    }

    Ok(())
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
