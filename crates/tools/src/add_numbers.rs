//! `addTwoNumbers`: Adds two numbers.
//!
//! Arguments reach this tool untouched by the argument normalizer, which only
//! rewrites arguments for the posting tool.

use async_trait::async_trait;
use postclaw_core::error::ToolError;
use postclaw_core::tool::{Tool, ToolResult};

pub struct AddTwoNumbersTool;

#[async_trait]
impl Tool for AddTwoNumbersTool {
    fn name(&self) -> &str {
        "addTwoNumbers"
    }

    fn description(&self) -> &str {
        "Add two numbers"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "a": { "type": "number" },
                "b": { "type": "number" }
            },
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let a = number_arg(&arguments, "a")?;
        let b = number_arg(&arguments, "b")?;
        let sum = a + b;

        Ok(ToolResult {
            success: true,
            output: format!("The sum of {} and {} is {}", fmt_number(a), fmt_number(b), fmt_number(sum)),
            data: Some(serde_json::json!({ "result": sum })),
        })
    }
}

/// Read a numeric argument; numeric strings are accepted too.
fn number_arg(arguments: &serde_json::Value, key: &str) -> Result<f64, ToolError> {
    let value = &arguments[key];
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing or non-numeric '{key}' argument")))
}

/// Drop the trailing `.0` for whole numbers.
fn fmt_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
