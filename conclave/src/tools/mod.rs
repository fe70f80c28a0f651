//! Built-in native tools.
//!
//! - [`math`]: square root and the four binary arithmetic operations,
//!   grouped as the `MathPlugin` plugin.
//!
//! # Example
//!
//! ```ignore
//! use conclave::tool::{ToolArguments, ToolSet};
//! use conclave::tools::math;
//!
//! let mut tools = ToolSet::new();
//! tools.import_plugin(math::PLUGIN_NAME, math::plugin())?;
//! let sum = tools.invoke("MathPlugin.Add", &ToolArguments::from([("input", "2"), ("number2", "3")]))?;
//! assert_eq!(sum, "5.0");
//! ```

pub mod math;
