//! Tool descriptors and the tool registry.
//!
//! A tool is plain data: a name, a natural-language description used by a
//! planner for selection, an ordered list of parameter descriptions, and a
//! function from string-typed arguments to a string result. Nothing numeric
//! crosses the registry boundary; each tool parses its inputs and formats its
//! output itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use conclave::tool::{ToolArguments, ToolDescriptor, ToolSet};
//!
//! let shout = ToolDescriptor::builder("Shout")
//!     .description("Upper-cases the input")
//!     .parameter("input", "The text to shout")
//!     .build(|args| Ok(args.require("input")?.to_uppercase()));
//!
//! let mut tools = ToolSet::new();
//! tools.register(shout)?;
//! let out = tools.invoke("Shout", &ToolArguments::from([("input", "hi")]))?;
//! assert_eq!(out, "HI");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ToolError;

/// A type alias for `Result<T, ToolError>`.
pub type ToolResult<T> = Result<T, ToolError>;

/// The function backing a tool.
pub type ToolFn = dyn Fn(&ToolArguments) -> ToolResult<String> + Send + Sync;

/// Separators accepted between a plugin name and a tool name.
///
/// `.` is the planner's notation (`MathPlugin.Add`); `-` is the form used in
/// function-calling definitions, whose names may not contain dots.
const PLUGIN_SEPARATORS: [char; 2] = ['.', '-'];

/// String-typed arguments passed to a tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments(BTreeMap<String, String>);

impl ToolArguments {
    /// Create an empty argument map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an argument, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Get an argument by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Get a required argument.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if the argument is absent.
    pub fn require(&self, name: &str) -> ToolResult<&str> {
        self.get(name)
            .ok_or_else(|| ToolError::invalid_args(format!("missing required parameter '{name}'")))
    }

    /// Get a required argument parsed as a finite double.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if the argument is absent,
    /// not a number, or not finite.
    pub fn number(&self, name: &str) -> ToolResult<f64> {
        parse_number(name, self.require(name)?)
    }

    /// Parse the first present argument among `names` as a finite double.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] if none of the names is
    /// present, or the first present one is not a finite number.
    pub fn first_number(&self, names: &[&str]) -> ToolResult<f64> {
        names
            .iter()
            .find_map(|name| self.get(name).map(|raw| parse_number(name, raw)))
            .unwrap_or_else(|| {
                Err(ToolError::invalid_args(format!(
                    "missing required parameter '{}'",
                    names.first().copied().unwrap_or_default()
                )))
            })
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn parse_number(name: &str, raw: &str) -> ToolResult<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        ToolError::invalid_args(format!("parameter '{name}' is not a number: '{raw}'"))
    })?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ToolError::invalid_args(format!(
            "parameter '{name}' is not finite: '{raw}'"
        )))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ToolArguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for ToolArguments {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Name and description of one tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Parameter name as used in [`ToolArguments`].
    pub name: String,
    /// Natural-language description for the planner.
    pub description: String,
}

impl ParameterDescriptor {
    /// Create a parameter descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A named, described, callable operation.
#[derive(Clone)]
pub struct ToolDescriptor {
    name: String,
    description: String,
    parameters: Vec<ParameterDescriptor>,
    plugin: Option<String>,
    function: Arc<ToolFn>,
}

impl ToolDescriptor {
    /// Start building a descriptor for a tool called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ToolDescriptorBuilder {
        ToolDescriptorBuilder {
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
        }
    }

    /// The tool name, unique within a [`ToolSet`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tool description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The ordered parameter list.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// The plugin this tool was imported under, if any.
    #[must_use]
    pub fn plugin(&self) -> Option<&str> {
        self.plugin.as_deref()
    }

    /// `Plugin.Name` when imported under a plugin, otherwise the bare name.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.joined_name('.')
    }

    /// Name used in function-calling definitions (`Plugin-Name`).
    #[must_use]
    pub fn function_name(&self) -> String {
        self.joined_name('-')
    }

    fn joined_name(&self, sep: char) -> String {
        match &self.plugin {
            Some(plugin) => format!("{plugin}{sep}{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Whether `reference` names this tool, bare or plugin-qualified.
    #[must_use]
    pub fn matches(&self, reference: &str) -> bool {
        if reference == self.name {
            return true;
        }
        let Some(plugin) = &self.plugin else {
            return false;
        };
        PLUGIN_SEPARATORS.iter().any(|sep| {
            reference
                .split_once(*sep)
                .is_some_and(|(p, n)| p == plugin && n == self.name)
        })
    }

    /// Call the tool function.
    ///
    /// # Errors
    ///
    /// Propagates whatever [`ToolError`] the tool function returns.
    pub fn invoke(&self, args: &ToolArguments) -> ToolResult<String> {
        (self.function)(args)
    }

    /// Function-calling definition for this tool.
    ///
    /// Every parameter is a required string, matching the string-typed
    /// argument contract.
    #[must_use]
    pub fn definition(&self) -> ToolDefinition {
        let properties: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({"type": "string", "description": p.description}),
                )
            })
            .collect();
        let required: Vec<&str> = self.parameters.iter().map(|p| p.name.as_str()).collect();

        ToolDefinition::new(
            self.function_name(),
            self.description.clone(),
            serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        )
    }

    /// One entry of the function manual shown to a planner.
    ///
    /// ```text
    /// MathPlugin.Add:
    ///   description: Adds two numbers together
    ///   inputs:
    ///     - input: The first number to add
    ///     - number2: The second number to add
    /// ```
    #[must_use]
    pub fn manual_entry(&self) -> String {
        let mut entry = format!(
            "{}:\n  description: {}\n  inputs:\n",
            self.qualified_name(),
            self.description
        );
        for p in &self.parameters {
            entry.push_str(&format!("    - {}: {}\n", p.name, p.description));
        }
        entry
    }
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ToolDescriptor`].
#[derive(Debug, Clone)]
pub struct ToolDescriptorBuilder {
    name: String,
    description: String,
    parameters: Vec<ParameterDescriptor>,
}

impl ToolDescriptorBuilder {
    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a parameter.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.parameters
            .push(ParameterDescriptor::new(name, description));
        self
    }

    /// Finish the descriptor with its function.
    #[must_use]
    pub fn build<F>(self, function: F) -> ToolDescriptor
    where
        F: Fn(&ToolArguments) -> ToolResult<String> + Send + Sync + 'static,
    {
        ToolDescriptor {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
            plugin: None,
            function: Arc::new(function),
        }
    }
}

/// Definition of a tool for LLM function calling.
///
/// Serializes to the OpenAI function calling format:
/// ```json
/// {"type": "function", "function": {"name": "...", "description": "...", "parameters": {...}}}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[non_exhaustive]
pub struct ToolDefinition {
    /// Name of the tool.
    pub name: String,
    /// Description of what the tool does.
    pub description: String,
    /// JSON schema for the tool's parameters.
    pub parameters: Value,
    /// Whether to use strict schema validation.
    #[serde(default)]
    pub strict: Option<bool>,
}

impl ToolDefinition {
    /// Create a new tool definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            strict: None,
        }
    }

    /// Enable strict schema validation (Structured Outputs).
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        if strict
            && let Some(obj) = self.parameters.as_object_mut()
            && !obj.contains_key("additionalProperties")
        {
            obj.insert("additionalProperties".to_owned(), Value::Bool(false));
        }
        self
    }

    /// Returns the tool name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Custom serialization to OpenAI function calling format.
impl Serialize for ToolDefinition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut function = serde_json::Map::new();
        function.insert("name".to_owned(), Value::String(self.name.clone()));
        function.insert(
            "description".to_owned(),
            Value::String(self.description.clone()),
        );
        function.insert("parameters".to_owned(), self.parameters.clone());
        if let Some(strict) = self.strict {
            function.insert("strict".to_owned(), Value::Bool(strict));
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry("function", &function)?;
        map.end()
    }
}

/// A registry of tools with unique names.
///
/// Tools keep their registration order, which is also the order of
/// [`definitions`](Self::definitions) and [`manual`](Self::manual).
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolSet {
    /// Create a new empty tool set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateName`] if a tool with the same name is
    /// already registered.
    pub fn register(&mut self, tool: ToolDescriptor) -> ToolResult<()> {
        if self.index.contains_key(tool.name()) {
            return Err(ToolError::duplicate(tool.name()));
        }
        debug!(tool = %tool.qualified_name(), "Registered tool");
        self.index.insert(tool.name().to_owned(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Register a group of tools under a plugin name.
    ///
    /// Either every tool is registered or none is.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateName`] if any tool name is already
    /// registered or repeated within `tools`.
    pub fn import_plugin(
        &mut self,
        plugin: impl Into<String>,
        tools: impl IntoIterator<Item = ToolDescriptor>,
    ) -> ToolResult<()> {
        let plugin = plugin.into();
        let tools: Vec<ToolDescriptor> = tools
            .into_iter()
            .map(|mut tool| {
                tool.plugin = Some(plugin.clone());
                tool
            })
            .collect();

        for (i, tool) in tools.iter().enumerate() {
            let repeated = tools[..i].iter().any(|t| t.name() == tool.name());
            if repeated || self.index.contains_key(tool.name()) {
                return Err(ToolError::duplicate(tool.name()));
            }
        }
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Look up a tool by bare or plugin-qualified name.
    #[must_use]
    pub fn get(&self, reference: &str) -> Option<&ToolDescriptor> {
        if let Some(&i) = self.index.get(reference) {
            return Some(&self.tools[i]);
        }
        self.tools.iter().find(|t| t.matches(reference))
    }

    /// Invoke a tool by name.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::NotFound`] if no tool matches `reference`, or the
    /// tool's own error unchanged.
    pub fn invoke(&self, reference: &str, args: &ToolArguments) -> ToolResult<String> {
        let tool = self
            .get(reference)
            .ok_or_else(|| ToolError::not_found(reference))?;
        debug!(tool = %tool.qualified_name(), ?args, "Invoking tool");
        tool.invoke(args)
    }

    /// Check if the set contains a tool matching `reference`.
    #[must_use]
    pub fn contains(&self, reference: &str) -> bool {
        self.get(reference).is_some()
    }

    /// Iterate over the tools in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    /// Qualified names of all tools.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(ToolDescriptor::qualified_name).collect()
    }

    /// Function-calling definitions of all tools.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDescriptor::definition).collect()
    }

    /// The function manual listing every tool, for planner prompts.
    #[must_use]
    pub fn manual(&self) -> String {
        self.tools
            .iter()
            .map(ToolDescriptor::manual_entry)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tool is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn echo() -> ToolDescriptor {
        ToolDescriptor::builder("Echo")
            .description("Echoes the input")
            .parameter("input", "Text to echo")
            .build(|args| Ok(args.require("input")?.to_owned()))
    }

    fn concat() -> ToolDescriptor {
        ToolDescriptor::builder("Concat")
            .description("Joins two strings")
            .parameter("input", "First")
            .parameter("other", "Second")
            .build(|args| Ok(format!("{}{}", args.require("input")?, args.require("other")?)))
    }

    mod tool_arguments {
        use super::*;

        #[test]
        fn from_array_and_get() {
            let args = ToolArguments::from([("input", "2"), ("number2", "3")]);
            assert_eq!(args.len(), 2);
            assert_eq!(args.get("input"), Some("2"));
            assert_eq!(args.get("missing"), None);
        }

        #[test]
        fn require_reports_missing_name() {
            let err = ToolArguments::new().require("number2").unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("number2")));
        }

        #[test]
        fn number_parses_and_trims() {
            let args = ToolArguments::new().with("x", " 2.5 ");
            assert!((args.number("x").unwrap() - 2.5).abs() < f64::EPSILON);
        }

        #[test]
        fn number_rejects_garbage_and_non_finite() {
            let args = ToolArguments::from([("a", "two"), ("b", "inf"), ("c", "NaN")]);
            for name in ["a", "b", "c"] {
                assert!(matches!(
                    args.number(name),
                    Err(ToolError::InvalidArguments(_))
                ));
            }
        }

        #[test]
        fn first_number_prefers_earlier_names() {
            let args = ToolArguments::from([("input", "9"), ("number", "4")]);
            assert!((args.first_number(&["number", "input"]).unwrap() - 4.0).abs() < f64::EPSILON);

            let args = ToolArguments::from([("input", "9")]);
            assert!((args.first_number(&["number", "input"]).unwrap() - 9.0).abs() < f64::EPSILON);

            let err = ToolArguments::new()
                .first_number(&["number", "input"])
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("number")));
        }

        #[test]
        fn serializes_as_plain_map() {
            let args = ToolArguments::from([("input", "1")]);
            assert_eq!(
                serde_json::to_value(&args).unwrap(),
                serde_json::json!({"input": "1"})
            );
        }
    }

    mod tool_descriptor {
        use super::*;

        #[test]
        fn builder_keeps_parameter_order() {
            let tool = concat();
            let names: Vec<&str> = tool.parameters().iter().map(|p| p.name.as_str()).collect();
            assert_eq!(names, ["input", "other"]);
            assert_eq!(tool.description(), "Joins two strings");
            assert!(tool.plugin().is_none());
        }

        #[test]
        fn names_without_plugin() {
            let tool = echo();
            assert_eq!(tool.qualified_name(), "Echo");
            assert_eq!(tool.function_name(), "Echo");
            assert!(tool.matches("Echo"));
            assert!(!tool.matches("Text.Echo"));
        }

        #[test]
        fn definition_lists_required_strings() {
            let def = concat().definition();
            assert_eq!(def.name, "Concat");
            assert_eq!(
                def.parameters["properties"]["other"]["type"],
                Value::String("string".into())
            );
            assert_eq!(def.parameters["required"], serde_json::json!(["input", "other"]));
        }

        #[test]
        fn manual_entry_lists_inputs() {
            let entry = concat().manual_entry();
            assert!(entry.starts_with("Concat:\n"));
            assert!(entry.contains("description: Joins two strings"));
            assert!(entry.contains("- other: Second"));
        }

        #[test]
        fn debug_hides_function() {
            let s = format!("{:?}", echo());
            assert!(s.contains("Echo"));
            assert!(s.contains(".."));
        }
    }

    mod tool_definition {
        use super::*;

        #[test]
        fn serialize_to_openai_format() {
            let json = serde_json::to_value(echo().definition()).unwrap();
            assert_eq!(json["type"], "function");
            assert_eq!(json["function"]["name"], "Echo");
            assert!(json["function"].get("strict").is_none());
        }

        #[test]
        fn with_strict_adds_additional_properties() {
            let def = echo().definition().with_strict(true);
            assert_eq!(def.parameters["additionalProperties"], Value::Bool(false));
            let json = serde_json::to_value(&def).unwrap();
            assert_eq!(json["function"]["strict"], Value::Bool(true));
        }
    }

    mod tool_set {
        use super::*;

        #[test]
        fn register_and_invoke() {
            let mut tools = ToolSet::new();
            tools.register(echo()).unwrap();
            let out = tools
                .invoke("Echo", &ToolArguments::from([("input", "hello")]))
                .unwrap();
            assert_eq!(out, "hello");
        }

        #[test]
        fn register_rejects_duplicate() {
            let mut tools = ToolSet::new();
            tools.register(echo()).unwrap();
            assert_eq!(
                tools.register(echo()),
                Err(ToolError::DuplicateName("Echo".into()))
            );
            assert_eq!(tools.len(), 1);
        }

        #[test]
        fn invoke_unknown_tool() {
            let tools = ToolSet::new();
            assert_eq!(
                tools.invoke("Nonexistent", &ToolArguments::new()),
                Err(ToolError::NotFound("Nonexistent".into()))
            );
        }

        #[test]
        fn invoke_passes_tool_errors_through() {
            let mut tools = ToolSet::new();
            tools.register(echo()).unwrap();
            assert!(matches!(
                tools.invoke("Echo", &ToolArguments::new()),
                Err(ToolError::InvalidArguments(_))
            ));
        }

        #[test]
        fn import_plugin_qualifies_names() {
            let mut tools = ToolSet::new();
            tools.import_plugin("TextPlugin", [echo(), concat()]).unwrap();

            assert_eq!(tools.names(), ["TextPlugin.Echo", "TextPlugin.Concat"]);
            assert!(tools.contains("Echo"));
            assert!(tools.contains("TextPlugin.Echo"));
            assert!(tools.contains("TextPlugin-Concat"));
            assert!(!tools.contains("OtherPlugin.Echo"));
            assert_eq!(tools.definitions()[0].name, "TextPlugin-Echo");
        }

        #[test]
        fn import_plugin_is_all_or_nothing() {
            let mut tools = ToolSet::new();
            tools.register(concat()).unwrap();

            let err = tools.import_plugin("TextPlugin", [echo(), concat()]);
            assert_eq!(err, Err(ToolError::DuplicateName("Concat".into())));
            assert!(!tools.contains("Echo"));

            let err = ToolSet::new().import_plugin("TextPlugin", [echo(), echo()]);
            assert_eq!(err, Err(ToolError::DuplicateName("Echo".into())));
        }

        #[test]
        fn manual_joins_entries_in_order() {
            let mut tools = ToolSet::new();
            tools.import_plugin("TextPlugin", [echo(), concat()]).unwrap();
            let manual = tools.manual();
            let echo_at = manual.find("TextPlugin.Echo").unwrap();
            let concat_at = manual.find("TextPlugin.Concat").unwrap();
            assert!(echo_at < concat_at);
        }

        #[test]
        fn tool_sets_are_send_and_sync() {
            fn assert_send_sync<T: Send + Sync>() {}
            assert_send_sync::<ToolSet>();
        }
    }
}
