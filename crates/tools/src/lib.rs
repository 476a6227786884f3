//! Built-in tool implementations for actloop.
//!
//! Mock tools that give the loop something deterministic to call:
//! integer arithmetic and an order lookup against an in-memory table.

pub mod arithmetic;
pub mod orders;

use actloop_core::error::RegistryError;
use actloop_core::tool::ToolRegistry;

pub use arithmetic::{ArithmeticTool, Operation};
pub use orders::OrderLookupTool;

/// Create a registry with all built-in tools, in prompt order:
/// `add`, `subtract`, `multiply`, `search_orders`.
pub fn default_registry(
    orders: impl IntoIterator<Item = (String, String)>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ArithmeticTool::add()))?;
    registry.register(Box::new(ArithmeticTool::subtract()))?;
    registry.register(Box::new(ArithmeticTool::multiply()))?;
    registry.register(Box::new(OrderLookupTool::new(orders)))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_lists_tools_in_order() {
        let registry = default_registry(Vec::new()).unwrap();
        assert_eq!(registry.names(), ["add", "subtract", "multiply", "search_orders"]);
    }

    #[test]
    fn definitions_carry_json_schema() {
        let registry = default_registry(Vec::new()).unwrap();
        let defs = registry.definitions();
        let search = defs.iter().find(|d| d.name == "search_orders").unwrap();
        assert_eq!(search.parameters["required"], serde_json::json!(["query"]));
    }
}
