//! # actloop core
//!
//! Domain types, traits, and error definitions for the actloop tool-calling
//! agent loop. This crate defines the domain model that the provider, tool
//! and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! The model service and tools are defined as traits here. Implementations
//! live in their respective crates, so tests can substitute scripted
//! providers and fake tools.

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{ActionFormat, FailurePolicy, LoopConfig};
pub use error::{Error, ErrorKind, Result};
pub use message::{ConversationId, Message, MessageToolCall, Role, Transcript};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolDefinition};
pub use tool::{Arguments, ParamSpec, ParamType, Tool, ToolOutput, ToolRegistry, ToolSpec};
