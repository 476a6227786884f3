//! Order lookup tool. Searches an in-memory order table.
//!
//! Stands in for an order management system so the loop can be exercised
//! end-to-end without network access. A missing order is reported as
//! [`ToolOutput::NotFound`], never as an error.

use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, ParamSpec, ParamType, Tool, ToolOutput, ToolSpec};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

pub struct OrderLookupTool {
    orders: BTreeMap<String, String>,
    spec: ToolSpec,
}

impl OrderLookupTool {
    /// Build from an order ID → details table. Keys are normalized to
    /// upper case so lookups are case-insensitive.
    pub fn new(orders: impl IntoIterator<Item = (String, String)>) -> Self {
        let orders = orders
            .into_iter()
            .map(|(id, details)| (id.trim().to_uppercase(), details))
            .collect();
        Self {
            orders,
            spec: ToolSpec::new(
                "search_orders",
                "Searches for order details by a specific order ID. Only use this tool \
                 if the user provides a specific order ID. The query parameter MUST be the order ID.",
                vec![ParamSpec::required("query", ParamType::String, "The order ID to look up")],
            ),
        }
    }

    fn lookup(&self, query: &str) -> ToolOutput {
        let key = query.trim().to_uppercase();
        if key.is_empty() {
            return ToolOutput::NotFound(
                "No order ID provided for search. Please provide a specific order ID. (Source: OMS)"
                    .into(),
            );
        }
        match self.orders.get(&key) {
            Some(details) => ToolOutput::Value(details.clone()),
            None => ToolOutput::NotFound(format!(
                "Order ID '{query}' not found. Please verify the order ID and try again. (Source: OMS)"
            )),
        }
    }
}

#[async_trait]
impl Tool for OrderLookupTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: &Arguments) -> Result<ToolOutput, ToolError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("'query' must be a string".into()))?;

        let output = self.lookup(query);
        debug!(
            query,
            found = matches!(output, ToolOutput::Value(_)),
            "Order lookup"
        );
        Ok(output)
    }
}
