//! System prompt assembly.
//!
//! The prompt lists every registered tool in registration order and spells
//! out the directive format the parser accepts.

use actloop_core::agent::{ActionFormat, LoopConfig};
use actloop_core::tool::ToolRegistry;
use std::fmt::Write;

const PREAMBLE: &str =
    "You are a helpful assistant. You can call tools to answer the user's request.";

const TEXT_FORMAT: &str = "\
To use a tool, reply with exactly these two lines:
Action: <tool name>
Action Input: <JSON object with the tool's arguments>
Then stop and wait for the tool result.";

const NATIVE_FORMAT: &str = "Call tools through function calling. Call at most one tool per reply.";

const RULES: &str = "\
Rules:
- Request at most one action per reply.
- When a tool result arrives, relay it to the user exactly as given. Do not add, infer, or invent details that are not in the result.
- If a tool reports that nothing was found, tell the user so and suggest they check their input.
- If a tool reports an error, tell the user about the error.
- If no tool fits the request, answer directly without an Action line and say that no suitable tool is available.
- After answering from a tool result, do not request the same action again.";

/// Build the system prompt for `registry`, honoring a configured override.
pub fn system_prompt(config: &LoopConfig, registry: &ToolRegistry) -> String {
    match &config.system_prompt {
        Some(custom) => custom.clone(),
        None => build_system_prompt(registry, config.action_format),
    }
}

pub fn build_system_prompt(registry: &ToolRegistry, format: ActionFormat) -> String {
    let mut prompt = String::from(PREAMBLE);
    prompt.push_str("\n\nAvailable tools:\n");
    if registry.is_empty() {
        prompt.push_str("(none)\n");
    }
    for tool in registry.tools() {
        let spec = tool.spec();
        let _ = writeln!(prompt, "- {}: {}", spec.signature(), spec.description);
    }

    prompt.push('\n');
    prompt.push_str(match format {
        ActionFormat::Text => TEXT_FORMAT,
        ActionFormat::Native => NATIVE_FORMAT,
    });
    prompt.push_str("\n\n");
    prompt.push_str(RULES);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ToolRegistry {
        actloop_tools::default_registry(Vec::new()).unwrap()
    }

    #[test]
    fn lists_tools_in_registration_order() {
        let prompt = build_system_prompt(&registry(), ActionFormat::Text);
        let add = prompt.find("- add(x: integer, y: integer)").unwrap();
        let sub = prompt.find("- subtract(").unwrap();
        let mul = prompt.find("- multiply(").unwrap();
        let search = prompt.find("- search_orders(query: string)").unwrap();
        assert!(add < sub && sub < mul && mul < search);
    }

    #[test]
    fn text_format_describes_directive() {
        let prompt = build_system_prompt(&registry(), ActionFormat::Text);
        assert!(prompt.contains("Action: <tool name>"));
        assert!(prompt.contains("Action Input:"));
        assert!(prompt.contains("no suitable tool is available"));
    }

    #[test]
    fn native_format_omits_directive() {
        let prompt = build_system_prompt(&registry(), ActionFormat::Native);
        assert!(!prompt.contains("Action Input:"));
        assert!(prompt.contains("function calling"));
    }

    #[test]
    fn configured_prompt_overrides() {
        let config = LoopConfig {
            system_prompt: Some("Be terse.".into()),
            ..LoopConfig::default()
        };
        assert_eq!(system_prompt(&config, &registry()), "Be terse.");
    }
}
