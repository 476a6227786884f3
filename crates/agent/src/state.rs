//! Per-conversation loop state and the transition rules.
//!
//! `awaiting_model → parsing → {dispatching | terminal}` and
//! `dispatching → awaiting_model`. [`decide`] is the only place that picks
//! the branch out of `parsing`; the runner performs the side effects.

use serde::{Deserialize, Serialize};

use crate::parser::{ActionCall, ParsedAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingModel,
    Parsing,
    Dispatching,
    Terminal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Running,
    Done,
    Error,
}

/// Why a conversation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The model gave a final answer.
    Completed,
    UnknownTool,
    Malformed,
    MultipleActions,
    IterationLimit,
    /// A tool call failed and the failure policy ended the loop.
    DispatchFailed,
    Cancelled,
    ModelUnavailable,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::UnknownTool => "unknown_tool",
            Self::Malformed => "malformed",
            Self::MultipleActions => "multiple_actions",
            Self::IterationLimit => "iteration_limit",
            Self::DispatchFailed => "dispatch_failed",
            Self::Cancelled => "cancelled",
            Self::ModelUnavailable => "model_unavailable",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Completed => Status::Done,
            _ => Status::Error,
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one conversation. Never shared between conversations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    /// Completed model turns
    pub iteration_count: u32,
    pub tool_calls_made: u32,
    pub phase: Phase,
    pub status: Status,
    /// A schema mismatch or execution fault was fed back to the model
    pub failed_dispatch_pending: bool,
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopState {
    pub fn new() -> Self {
        Self {
            iteration_count: 0,
            tool_calls_made: 0,
            phase: Phase::AwaitingModel,
            status: Status::Running,
            failed_dispatch_pending: false,
        }
    }

    /// A model response has been fully assembled.
    pub fn begin_parsing(&mut self) {
        debug_assert_eq!(self.phase, Phase::AwaitingModel);
        self.iteration_count += 1;
        self.phase = Phase::Parsing;
    }

    pub fn begin_dispatch(&mut self) {
        debug_assert_eq!(self.phase, Phase::Parsing);
        self.phase = Phase::Dispatching;
    }

    /// The tool result is in the transcript; always back to the model.
    pub fn finish_dispatch(&mut self, failed: bool) {
        debug_assert_eq!(self.phase, Phase::Dispatching);
        self.tool_calls_made += 1;
        self.failed_dispatch_pending |= failed;
        self.phase = Phase::AwaitingModel;
    }

    pub fn terminate(&mut self, reason: TerminationReason) {
        self.phase = Phase::Terminal;
        self.status = reason.status();
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == Phase::Terminal
    }
}

/// Branch taken out of `parsing`.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Dispatch(ActionCall),
    Terminate(TerminationReason),
}

/// Decide what follows a parsed model turn.
///
/// `iteration_count` already includes the turn being decided. At the cap a
/// call is never dispatched, but a plain answer still completes normally.
pub fn decide(
    parsed: &ParsedAction,
    iteration_count: u32,
    max_iterations: u32,
    failed_dispatch_pending: bool,
) -> Transition {
    match parsed {
        ParsedAction::None => Transition::Terminate(TerminationReason::Completed),
        ParsedAction::UnknownTool { .. } => Transition::Terminate(TerminationReason::UnknownTool),
        ParsedAction::Malformed { .. } => Transition::Terminate(TerminationReason::Malformed),
        ParsedAction::MultipleActions { .. } => {
            Transition::Terminate(TerminationReason::MultipleActions)
        }
        ParsedAction::Call(_) if failed_dispatch_pending => {
            Transition::Terminate(TerminationReason::DispatchFailed)
        }
        ParsedAction::Call(_) if iteration_count >= max_iterations => {
            Transition::Terminate(TerminationReason::IterationLimit)
        }
        ParsedAction::Call(call) => Transition::Dispatch(call.clone()),
    }
}
