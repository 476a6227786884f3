//! The actloop control loop.
//!
//! The loop follows a **Reason → Act → Observe** cycle:
//!
//! 1. **Send** the transcript (with the system prompt) to the model
//! 2. **Parse** the newest assistant message for one tool directive
//! 3. **Dispatch** a recognized call and append its result
//! 4. **Repeat** until the model answers without a directive, a parse
//!    error ends the conversation, or the iteration cap is reached
//!
//! A tool result is never a final answer: the model always gets to see it
//! and respond.

pub mod context;
pub mod dispatcher;
pub mod error;
pub mod loop_runner;
pub mod parser;
pub mod prompt;
pub mod state;
pub mod stream_event;

pub use context::AgentContext;
pub use dispatcher::{DispatchError, DispatchOutcome, DispatchRecord, Dispatcher};
pub use error::AgentError;
pub use loop_runner::{AgentLoop, LoopOutcome, LoopStream};
pub use parser::{ActionCall, Directive, ParsedAction, ResponseParser};
pub use state::{LoopState, Phase, Status, TerminationReason, Transition};
pub use stream_event::LoopEvent;
