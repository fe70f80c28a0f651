//! Arithmetic tools.
//!
//! Each tool parses its string arguments as `f64`, computes, and formats the
//! result with [`format_number`]. The tools share no state and may be called
//! in any order or concurrently.

use crate::error::ToolError;
use crate::tool::{ToolArguments, ToolDescriptor, ToolResult};

/// Plugin name the math tools are conventionally imported under.
pub const PLUGIN_NAME: &str = "MathPlugin";

/// Format a double so that parsing the string yields the same value.
///
/// Integral values keep a trailing `.0` (`2.0`, not `2`).
#[must_use]
pub fn format_number(value: f64) -> String {
    format!("{value:?}")
}

fn finite(op: &str, value: f64) -> ToolResult<String> {
    if value.is_finite() {
        Ok(format_number(value))
    } else {
        Err(ToolError::invalid_args(format!(
            "{op} result is out of range"
        )))
    }
}

/// `Sqrt(number)`: real-domain square root.
///
/// Reads `number`, falling back to `input` so the tool can consume the
/// previous step's output inside a plan.
#[must_use]
pub fn sqrt() -> ToolDescriptor {
    ToolDescriptor::builder("Sqrt")
        .description("Takes the square root of a number")
        .parameter("number", "The value to take the square root of")
        .build(|args| {
            let number = args.first_number(&["number", "input"])?;
            if number < 0.0 {
                return Err(ToolError::invalid_args(format!(
                    "cannot take the square root of negative number {}",
                    format_number(number)
                )));
            }
            Ok(format_number(number.sqrt()))
        })
}

fn binary(
    name: &str,
    description: &str,
    input_description: &str,
    number2_description: &str,
    op: fn(f64, f64) -> ToolResult<f64>,
) -> ToolDescriptor {
    let op_name = name.to_owned();
    ToolDescriptor::builder(name)
        .description(description)
        .parameter("input", input_description)
        .parameter("number2", number2_description)
        .build(move |args: &ToolArguments| {
            let input = args.number("input")?;
            let number2 = args.number("number2")?;
            finite(&op_name, op(input, number2)?)
        })
}

/// `Add(input, number2)`.
#[must_use]
pub fn add() -> ToolDescriptor {
    binary(
        "Add",
        "Adds two numbers together",
        "The first number to add",
        "The second number to add",
        |a, b| Ok(a + b),
    )
}

/// `Subtract(input, number2)`: `input - number2`.
#[must_use]
pub fn subtract() -> ToolDescriptor {
    binary(
        "Subtract",
        "Subtract two numbers",
        "The first number to subtract from",
        "The second number to subtract away",
        |a, b| Ok(a - b),
    )
}

/// `Multiply(input, number2)`.
#[must_use]
pub fn multiply() -> ToolDescriptor {
    binary(
        "Multiply",
        "Multiply two numbers. When increasing by a percentage, don't forget to add 1 to the percentage.",
        "The first number to multiply",
        "The second number to multiply",
        |a, b| Ok(a * b),
    )
}

/// `Divide(input, number2)`: `input / number2`.
///
/// Fails with [`ToolError::DivisionByZero`] when `number2` parses to zero.
#[must_use]
pub fn divide() -> ToolDescriptor {
    binary(
        "Divide",
        "Divide two numbers",
        "The first number to divide from",
        "The second number to divide by",
        |a, b| {
            if b == 0.0 {
                Err(ToolError::DivisionByZero)
            } else {
                Ok(a / b)
            }
        },
    )
}

/// All five math tools, in declaration order.
#[must_use]
pub fn plugin() -> Vec<ToolDescriptor> {
    vec![sqrt(), add(), subtract(), multiply(), divide()]
}
