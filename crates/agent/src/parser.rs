//! Response parser: turns the newest assistant message into a [`ParsedAction`].
//!
//! Two directive forms are understood:
//!
//! - **Text**: a line `Action: <tool>` immediately followed by
//!   `Action Input: <json object>`. Prefixes match case-insensitively after
//!   leading whitespace; backticks around the name or payload are ignored.
//! - **Native**: structured `tool_calls` attached to the message by the
//!   model service. When present they take precedence over the text.
//!
//! The parser never executes anything. Tool names are resolved against the
//! registry (ignoring case) so that only registered names reach dispatch.

use actloop_core::agent::LoopConfig;
use actloop_core::error::ErrorKind;
use actloop_core::message::{Message, MessageToolCall, Transcript};
use actloop_core::tool::{Arguments, Resolution, ToolRegistry};
use serde_json::Value;
use tracing::debug;

const ACTION_PREFIX: &str = "action:";
const INPUT_PREFIX: &str = "action input:";

/// A recognized request to run one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCall {
    /// Canonical registered name
    pub tool_name: String,
    pub arguments: Arguments,
    /// Set when the model service assigned an id (native calls)
    pub call_id: Option<String>,
}

/// What the newest assistant message asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAction {
    /// No directive: the message is a final answer.
    None,
    Call(ActionCall),
    UnknownTool { name: String },
    Malformed { tool_name: Option<String>, reason: String },
    MultipleActions { count: usize },
}

impl ParsedAction {
    /// Error class for the erroneous outcomes.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::UnknownTool { .. } => Some(ErrorKind::UnknownTool),
            Self::Malformed { .. } => Some(ErrorKind::ParseMalformed),
            Self::None | Self::Call(_) | Self::MultipleActions { .. } => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// A text directive, as a model is asked to write it.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub tool_name: String,
    pub arguments: Arguments,
}

impl Directive {
    pub fn new(tool_name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Canonical two-line form.
    pub fn render(&self) -> String {
        format!(
            "Action: {}\nAction Input: {}",
            self.tool_name,
            Value::Object(self.arguments.clone())
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResponseParser {
    reject_multiple_actions: bool,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self {
            reject_multiple_actions: true,
        }
    }
}

impl ResponseParser {
    pub fn new(reject_multiple_actions: bool) -> Self {
        Self {
            reject_multiple_actions,
        }
    }

    pub fn from_config(config: &LoopConfig) -> Self {
        Self::new(config.reject_multiple_actions)
    }

    /// Parse the newest assistant message of a transcript.
    pub fn parse_transcript(
        &self,
        transcript: &Transcript,
        registry: &ToolRegistry,
    ) -> ParsedAction {
        match transcript.last_assistant() {
            Some(message) => self.parse(message, registry),
            None => ParsedAction::None,
        }
    }

    /// Parse a single assistant message.
    pub fn parse(&self, message: &Message, registry: &ToolRegistry) -> ParsedAction {
        let parsed = if message.tool_calls.is_empty() {
            self.parse_text(&message.content, registry)
        } else {
            self.parse_native(&message.tool_calls, registry)
        };
        debug!(?parsed, "Parsed model output");
        parsed
    }

    fn parse_native(&self, calls: &[MessageToolCall], registry: &ToolRegistry) -> ParsedAction {
        if calls.len() > 1 && self.reject_multiple_actions {
            return ParsedAction::MultipleActions { count: calls.len() };
        }
        let Some(call) = calls.first() else {
            return ParsedAction::None;
        };

        let tool_name = match resolve(&call.name, registry) {
            Ok(name) => name,
            Err(action) => return action,
        };

        // Some servers send an empty string for a call without arguments
        let raw = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };

        match decode_arguments(raw) {
            Ok(arguments) => ParsedAction::Call(ActionCall {
                tool_name,
                arguments,
                call_id: Some(call.id.clone()),
            }),
            Err(reason) => ParsedAction::Malformed {
                tool_name: Some(tool_name),
                reason,
            },
        }
    }

    fn parse_text(&self, content: &str, registry: &ToolRegistry) -> ParsedAction {
        let lines: Vec<&str> = content.lines().collect();
        let directives: Vec<(usize, &str)> = lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| {
                strip_prefix_ignore_case(line, ACTION_PREFIX)
                    .and_then(directive_name)
                    .map(|name| (i, name))
            })
            .collect();

        if directives.len() > 1 && self.reject_multiple_actions {
            return ParsedAction::MultipleActions {
                count: directives.len(),
            };
        }
        let Some(&(line_idx, name)) = directives.first() else {
            return ParsedAction::None;
        };

        // Unknown names are reported before the payload is looked at
        let tool_name = match resolve(name, registry) {
            Ok(name) => name,
            Err(action) => return action,
        };

        let Some(payload) = lines
            .get(line_idx + 1)
            .and_then(|line| strip_prefix_ignore_case(line, INPUT_PREFIX))
        else {
            return ParsedAction::Malformed {
                tool_name: Some(tool_name),
                reason: "missing 'Action Input:' line after 'Action:'".into(),
            };
        };

        match decode_arguments(strip_backticks(payload)) {
            Ok(arguments) => ParsedAction::Call(ActionCall {
                tool_name,
                arguments,
                call_id: None,
            }),
            Err(reason) => ParsedAction::Malformed {
                tool_name: Some(tool_name),
                reason,
            },
        }
    }
}

/// Map a model-supplied name onto a registered one.
fn resolve(name: &str, registry: &ToolRegistry) -> Result<String, ParsedAction> {
    match registry.resolve_ignore_case(name) {
        Resolution::Unique(tool) => Ok(tool.name().to_string()),
        Resolution::Missing => Err(ParsedAction::UnknownTool {
            name: name.to_string(),
        }),
        // Names differing only by case cannot be told apart
        Resolution::Ambiguous => Err(ParsedAction::None),
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let line = line.trim_start();
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

/// The tool name of an `Action:` line, if the rest of the line is a single
/// identifier. Prose after `Action:` is not a directive.
fn directive_name(rest: &str) -> Option<&str> {
    let name = strip_backticks(rest);
    let is_identifier = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    is_identifier.then_some(name)
}

fn strip_backticks(s: &str) -> &str {
    s.trim().trim_matches('`').trim()
}

/// Decode an argument payload: a JSON object whose values are primitives.
fn decode_arguments(raw: &str) -> Result<Arguments, String> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("Action Input is not valid JSON: {e}"))?;

    let Value::Object(arguments) = value else {
        return Err("Action Input must be a JSON object".into());
    };

    if let Some((key, _)) = arguments
        .iter()
        .find(|(_, v)| v.is_array() || v.is_object())
    {
        return Err(format!(
            "Action Input value for '{key}' must be a string, number, boolean or null"
        ));
    }

    Ok(arguments)
}
