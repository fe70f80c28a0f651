//! Plans and their sequential execution.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, warn};

use crate::error::{PlanError, Result, ToolError};
use crate::tool::{ToolArguments, ToolResult, ToolSet};

/// Name of the variable that carries each step's output to the next step.
pub const INPUT_VARIABLE: &str = "input";

/// What a step actually ran with and produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    /// Arguments after variable resolution.
    pub bindings: ToolArguments,
    /// The tool's result.
    pub output: String,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}} -> {}", self.output)
    }
}

/// One tool invocation in a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Tool reference, bare (`Add`) or qualified (`MathPlugin.Add`).
    pub tool: String,
    /// Human-readable description, usually the tool's own.
    #[serde(default)]
    pub description: String,
    /// Parameters as emitted by the planner; `$NAME` values are variables.
    #[serde(default)]
    pub parameters: ToolArguments,
    /// Variable that receives this step's output, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_variable: Option<String>,
    /// Set once the step has run successfully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StepState>,
}

impl Step {
    /// Create a step calling `tool`.
    #[must_use]
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            description: String::new(),
            parameters: ToolArguments::new(),
            output_variable: None,
            state: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a parameter. Use a `$NAME` value to read a plan variable.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Store this step's output under `name`.
    #[must_use]
    pub fn with_output_variable(mut self, name: impl Into<String>) -> Self {
        self.output_variable = Some(name.into());
        self
    }

    /// Whether the step has run.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.state.is_some()
    }

    /// Resolve parameters against `variables`.
    ///
    /// The current `input` is bound implicitly unless the step sets it.
    fn resolve(&self, variables: &BTreeMap<String, String>) -> ToolResult<ToolArguments> {
        let mut bindings = ToolArguments::new();
        if let Some(input) = variables.get(INPUT_VARIABLE).filter(|v| !v.is_empty()) {
            bindings.insert(INPUT_VARIABLE, input.as_str());
        }
        for (name, value) in self.parameters.iter() {
            let resolved = match variable_name(value) {
                Some(var) => variables
                    .get(var)
                    .or_else(|| variables.get(&var.to_lowercase()))
                    .ok_or_else(|| {
                        ToolError::invalid_args(format!(
                            "parameter '{name}' refers to unknown variable ${var}"
                        ))
                    })?
                    .as_str(),
                None => value,
            };
            bindings.insert(name, resolved);
        }
        Ok(bindings)
    }
}

/// `$NAME` → `NAME` for identifier-shaped names, otherwise `None`.
fn variable_name(value: &str) -> Option<&str> {
    let name = value.trim().strip_prefix('$')?;
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

/// An ordered sequence of tool invocations derived from a goal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// The goal this plan was created for.
    pub goal: String,
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

impl Plan {
    /// Create a plan from steps.
    #[must_use]
    pub fn new(goal: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            goal: goal.into(),
            steps,
        }
    }

    /// Append a step.
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Whether the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Execute the plan with an empty initial `input`.
    ///
    /// # Errors
    ///
    /// See [`invoke_with`](Self::invoke_with).
    pub fn invoke(&mut self, tools: &ToolSet) -> Result<String> {
        self.invoke_with(tools, ToolArguments::new())
    }

    /// Execute every step in order and return the last step's output.
    ///
    /// `variables` seeds the plan context. Each step's output becomes the
    /// new `input` and, when the step names an output variable, is also
    /// stored under that name. Steps that ran keep their [`StepState`]; a
    /// failing step and everything after it stay untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::Empty`] for a plan without steps, and
    /// [`PlanError::Step`] carrying the tool's error unmodified when a step
    /// fails, including [`ToolError::NotFound`] for a tool the set lacks.
    pub fn invoke_with(&mut self, tools: &ToolSet, variables: ToolArguments) -> Result<String> {
        if self.steps.is_empty() {
            return Err(PlanError::empty(&self.goal).into());
        }

        let span = info_span!("plan", goal = %self.goal, steps = self.steps.len());
        let _enter = span.enter();

        let mut variables: BTreeMap<String, String> = variables
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        variables.entry(INPUT_VARIABLE.to_owned()).or_default();

        for (index, step) in self.steps.iter_mut().enumerate() {
            let outcome = step
                .resolve(&variables)
                .and_then(|bindings| {
                    tools
                        .invoke(&step.tool, &bindings)
                        .map(|output| (bindings, output))
                });

            let (bindings, output) = outcome.map_err(|source| {
                warn!(index, tool = %step.tool, error = %source, "Plan step failed");
                PlanError::Step {
                    index,
                    tool: step.tool.clone(),
                    source,
                }
            })?;

            debug!(index, tool = %step.tool, %output, "Plan step completed");
            if let Some(name) = &step.output_variable {
                variables.insert(name.clone(), output.clone());
            }
            variables.insert(INPUT_VARIABLE.to_owned(), output.clone());
            step.state = Some(StepState { bindings, output });
        }

        Ok(variables.remove(INPUT_VARIABLE).unwrap_or_default())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Goal: {}", self.goal)?;
        for (i, step) in self.steps.iter().enumerate() {
            write!(f, "  {}. {}", i + 1, step.tool)?;
            for (name, value) in step.parameters.iter() {
                write!(f, " {name}={value}")?;
            }
            if let Some(var) = &step.output_variable {
                write!(f, " -> ${var}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::tools::math;

    fn math_tools() -> ToolSet {
        let mut tools = ToolSet::new();
        tools.import_plugin(math::PLUGIN_NAME, math::plugin()).unwrap();
        tools
    }

    mod variables {
        use super::*;

        #[test]
        fn variable_name_shapes() {
            assert_eq!(variable_name("$SUM"), Some("SUM"));
            assert_eq!(variable_name(" $input "), Some("input"));
            assert_eq!(variable_name("$"), None);
            assert_eq!(variable_name("$5 off"), None);
            assert_eq!(variable_name("SUM"), None);
        }

        #[test]
        fn input_is_bound_implicitly() {
            let vars = BTreeMap::from([(INPUT_VARIABLE.to_owned(), "5.0".to_owned())]);
            let bindings = Step::new("Subtract")
                .with_parameter("number2", "1")
                .resolve(&vars)
                .unwrap();
            assert_eq!(bindings.get("input"), Some("5.0"));
            assert_eq!(bindings.get("number2"), Some("1"));
        }

        #[test]
        fn explicit_input_wins() {
            let vars = BTreeMap::from([(INPUT_VARIABLE.to_owned(), "5.0".to_owned())]);
            let bindings = Step::new("Add")
                .with_parameter("input", "7")
                .resolve(&vars)
                .unwrap();
            assert_eq!(bindings.get("input"), Some("7"));
        }

        #[test]
        fn unknown_variable_is_invalid() {
            let err = Step::new("Add")
                .with_parameter("number2", "$MISSING")
                .resolve(&BTreeMap::new())
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("MISSING")));
        }
    }

    mod invoke {
        use super::*;

        #[test]
        fn threads_output_into_input() {
            let mut plan = Plan::new("add 2 and 3 then subtract 1", Vec::new())
                .with_step(
                    Step::new("MathPlugin.Add")
                        .with_parameter("input", "2")
                        .with_parameter("number2", "3"),
                )
                .with_step(Step::new("MathPlugin.Subtract").with_parameter("number2", "1"));

            assert_eq!(plan.invoke(&math_tools()).unwrap(), "4.0");
            assert_eq!(plan.steps[0].state.as_ref().unwrap().output, "5.0");
            assert_eq!(
                plan.steps[1].state.as_ref().unwrap().bindings.get("input"),
                Some("5.0")
            );
        }

        #[test]
        fn named_variables_survive_later_steps() {
            let mut plan = Plan::default()
                .with_step(
                    Step::new("Sqrt")
                        .with_parameter("number", "16")
                        .with_output_variable("ROOT"),
                )
                .with_step(
                    Step::new("Multiply")
                        .with_parameter("input", "10")
                        .with_parameter("number2", "3"),
                )
                .with_step(Step::new("Add").with_parameter("number2", "$ROOT"));

            assert_eq!(plan.invoke(&math_tools()).unwrap(), "34.0");
        }

        #[test]
        fn seeded_input_reaches_first_step() {
            let mut plan = Plan::default().with_step(Step::new("Sqrt"));
            let out = plan
                .invoke_with(&math_tools(), ToolArguments::from([("input", "81")]))
                .unwrap();
            assert_eq!(out, "9.0");
        }

        #[test]
        fn empty_plan_fails() {
            let err = Plan::new("nothing to do", Vec::new())
                .invoke(&math_tools())
                .unwrap_err();
            assert!(matches!(
                err,
                Error::Plan(PlanError::Empty { ref goal }) if goal == "nothing to do"
            ));
        }

        #[test]
        fn failing_step_keeps_committed_state() {
            let mut plan = Plan::default()
                .with_step(
                    Step::new("Add")
                        .with_parameter("input", "1")
                        .with_parameter("number2", "1"),
                )
                .with_step(Step::new("Divide").with_parameter("number2", "0"))
                .with_step(Step::new("Add").with_parameter("number2", "1"));

            let err = plan.invoke(&math_tools()).unwrap_err();
            let Error::Plan(PlanError::Step { index, tool, source }) = err else {
                panic!("expected a step error");
            };
            assert_eq!(index, 1);
            assert_eq!(tool, "Divide");
            assert_eq!(source, ToolError::DivisionByZero);
            assert!(plan.steps[0].is_done());
            assert!(!plan.steps[1].is_done());
            assert!(!plan.steps[2].is_done());
        }

        #[test]
        fn unknown_tool_passes_through() {
            let mut plan = Plan::default().with_step(Step::new("MathPlugin.Modulo"));
            let err = plan.invoke(&math_tools()).unwrap_err();
            assert!(matches!(
                err,
                Error::Plan(PlanError::Step {
                    source: ToolError::NotFound(_),
                    ..
                })
            ));
        }
    }

    mod display {
        use super::*;

        #[test]
        fn step_state_lists_bindings() {
            let state = StepState {
                bindings: ToolArguments::from([("input", "2"), ("number2", "3")]),
                output: "5.0".into(),
            };
            assert_eq!(state.to_string(), "{input: 2, number2: 3} -> 5.0");
        }

        #[test]
        fn plan_lists_steps() {
            let plan = Plan::new("g", Vec::new()).with_step(
                Step::new("MathPlugin.Add")
                    .with_parameter("number2", "3")
                    .with_output_variable("SUM"),
            );
            assert_eq!(plan.to_string(), "Goal: g\n  1. MathPlugin.Add number2=3 -> $SUM\n");
        }
    }
}
