//! Control loop settings.

use serde::{Deserialize, Serialize};

/// Upper bound accepted for `max_iterations`. The cap must stay small.
pub const MAX_ITERATIONS_CEILING: u32 = 50;

/// Configuration for the control loop's behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Maximum model turns per conversation (hard termination bound)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Reject a model turn that requests more than one action
    #[serde(default = "default_true")]
    pub reject_multiple_actions: bool,

    /// What to do after a tool call fails validation or execution
    #[serde(default)]
    pub on_tool_error: FailurePolicy,

    /// How the model expresses tool calls
    #[serde(default)]
    pub action_format: ActionFormat,

    /// Replaces the generated system prompt when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_true() -> bool {
    true
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            reject_multiple_actions: true,
            on_tool_error: FailurePolicy::default(),
            action_format: ActionFormat::default(),
            system_prompt: None,
        }
    }
}

/// Policy for schema mismatches and execution faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Append the error as a tool result and give the model one more turn
    /// to explain it. A further action request in that turn ends the loop.
    #[default]
    FeedBackOnce,
    /// End the loop right after the failed result is appended.
    Terminate,
}

/// How tool calls are expressed by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFormat {
    /// `Action:` / `Action Input:` lines in free text.
    #[default]
    Text,
    /// The model service's structured function-calling field.
    Native,
}
