//! Integer arithmetic tools: `add`, `subtract`, `multiply`.
//!
//! Each takes two integers `x` and `y` and returns the integer result.
//! Overflow is reported as an execution fault rather than wrapping.

use actloop_core::error::ToolError;
use actloop_core::tool::{Arguments, ParamSpec, ParamType, Tool, ToolOutput, ToolSpec};
use async_trait::async_trait;
use tracing::debug;

/// Which operation an [`ArithmeticTool`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Self::Add => "Adds two integers together and returns the sum.",
            Self::Subtract => {
                "Subtracts the second integer from the first and returns the difference."
            }
            Self::Multiply => "Multiplies two integers and returns the product.",
        }
    }

    fn apply(self, x: i64, y: i64) -> Option<i64> {
        match self {
            Self::Add => x.checked_add(y),
            Self::Subtract => x.checked_sub(y),
            Self::Multiply => x.checked_mul(y),
        }
    }
}

pub struct ArithmeticTool {
    op: Operation,
    spec: ToolSpec,
}

impl ArithmeticTool {
    pub fn new(op: Operation) -> Self {
        let spec = ToolSpec::new(
            op.name(),
            op.description(),
            vec![
                ParamSpec::required("x", ParamType::Integer, "First operand"),
                ParamSpec::required("y", ParamType::Integer, "Second operand"),
            ],
        );
        Self { op, spec }
    }

    pub fn add() -> Self {
        Self::new(Operation::Add)
    }

    pub fn subtract() -> Self {
        Self::new(Operation::Subtract)
    }

    pub fn multiply() -> Self {
        Self::new(Operation::Multiply)
    }

    fn operand(&self, arguments: &Arguments, key: &str) -> Result<i64, ToolError> {
        arguments
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must be an integer")))
    }
}

#[async_trait]
impl Tool for ArithmeticTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: &Arguments) -> Result<ToolOutput, ToolError> {
        let x = self.operand(arguments, "x")?;
        let y = self.operand(arguments, "y")?;
        debug!(tool = self.op.name(), x, y, "Executing arithmetic");

        self.op
            .apply(x, y)
            .map(|v| ToolOutput::Value(v.to_string()))
            .ok_or_else(|| ToolError::ExecutionFailed {
                tool_name: self.op.name().into(),
                reason: format!("integer overflow computing {}({x}, {y})", self.op.name()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(x: serde_json::Value, y: serde_json::Value) -> Arguments {
        let mut map = Arguments::new();
        map.insert("x".into(), x);
        map.insert("y".into(), y);
        map
    }

    #[tokio::test]
    async fn add_two_integers() {
        let out = ArithmeticTool::add().execute(&args(json!(5), json!(3))).await.unwrap();
        assert_eq!(out, ToolOutput::Value("8".into()));
    }

    #[tokio::test]
    async fn subtract_goes_negative() {
        let out = ArithmeticTool::subtract()
            .execute(&args(json!(3), json!(10)))
            .await
            .unwrap();
        assert_eq!(out.text(), "-7");
    }

    #[tokio::test]
    async fn multiply_two_integers() {
        let out = ArithmeticTool::multiply()
            .execute(&args(json!(6), json!(7)))
            .await
            .unwrap();
        assert_eq!(out.text(), "42");
    }

    #[tokio::test]
    async fn overflow_is_an_execution_fault() {
        let err = ArithmeticTool::multiply()
            .execute(&args(json!(i64::MAX), json!(2)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::ExecutionFailed { ref tool_name, .. } if tool_name == "multiply"
        ));
    }

    #[tokio::test]
    async fn non_integer_operand_is_rejected() {
        let err = ArithmeticTool::add()
            .execute(&args(json!("5"), json!(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn same_call_twice_gives_same_result() {
        let tool = ArithmeticTool::add();
        let a = tool.execute(&args(json!(5), json!(3))).await.unwrap();
        let b = tool.execute(&args(json!(5), json!(3))).await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn spec_declares_two_required_integers() {
        let tool = ArithmeticTool::subtract();
        assert_eq!(tool.name(), "subtract");
        assert_eq!(tool.spec().signature(), "subtract(x: integer, y: integer)");
    }
}
