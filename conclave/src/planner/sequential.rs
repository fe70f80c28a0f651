//! LLM-backed sequential planner.
//!
//! The model is shown the function manual of a [`ToolSet`] and asked for an
//! XML plan:
//!
//! ```xml
//! <plan>
//!   <function.MathPlugin.Add input="2" number2="3" setContextVariable="SUM"/>
//!   <function.MathPlugin.Subtract input="$SUM" number2="1"/>
//! </plan>
//! ```
//!
//! Functions the model names but the tool set lacks are kept as-is; they
//! surface as [`ToolError::NotFound`](crate::error::ToolError::NotFound)
//! when the plan runs.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info};

use crate::chat::{ChatRequest, SharedChatProvider};
use crate::error::{LlmError, PlanError, Result};
use crate::tool::ToolSet;

use super::Planner;
use super::plan::{Plan, Step};

const FUNCTION_PREFIX: &str = "function.";

const PLAN_PROMPT: &str = r#"Build an XML plan that reaches the goal using only the functions listed below.

[AVAILABLE FUNCTIONS]
{functions}
[END AVAILABLE FUNCTIONS]

Rules:
- Write each step as one element named "function." followed by the function name, e.g. <function.MathPlugin.Add input="2" number2="3"/>.
- Pass every input as an attribute. Literal values go in as-is.
- The output of each step is available to the next step as "input"; it is passed implicitly.
- To keep an output for a later step, add setContextVariable="NAME" and refer to it later as "$NAME".
- Never use a function that is not in the list above.
- Keep the plan as short as possible.
- Answer with the <plan> element only. If the goal cannot be reached with these functions, answer <plan/>.

<goal>{goal}</goal>
"#;

/// Plans by asking a chat model for an XML step list.
#[derive(Clone)]
pub struct SequentialPlanner {
    provider: SharedChatProvider,
    timeout: Option<Duration>,
    max_tokens: u32,
    temperature: f32,
}

impl SequentialPlanner {
    /// Default completion budget for a plan.
    pub const DEFAULT_MAX_TOKENS: u32 = 1024;

    /// Create a planner backed by `provider`.
    #[must_use]
    pub fn new(provider: SharedChatProvider) -> Self {
        Self {
            provider,
            timeout: None,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
            temperature: 0.0,
        }
    }

    /// Bound the planning call by `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the completion budget.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Render the planning prompt for `goal`.
    #[must_use]
    pub fn prompt(goal: &str, tools: &ToolSet) -> String {
        PLAN_PROMPT
            .replace("{functions}", tools.manual().trim_end())
            .replace("{goal}", goal)
    }

    async fn complete(&self, prompt: String) -> std::result::Result<String, LlmError> {
        let request = ChatRequest::new(self.provider.default_model())
            .user(prompt)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature);

        let call = self.provider.chat(&request);
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| LlmError::timeout(limit))??,
            None => call.await?,
        };
        Ok(response.text().to_owned())
    }
}

impl std::fmt::Debug for SequentialPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialPlanner")
            .field("provider", &self.provider.provider_name())
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Planner for SequentialPlanner {
    async fn create_plan(&self, goal: &str, tools: &ToolSet) -> Result<Plan> {
        if tools.is_empty() {
            return Err(PlanError::empty(goal).into());
        }

        let reply = self
            .complete(Self::prompt(goal, tools))
            .await
            .map_err(|e| e.or_provider(self.provider.provider_name()))?;
        debug!(reply = %reply, "Planner reply");

        let plan = parse_plan(goal, &reply, tools)?;
        if plan.is_empty() {
            return Err(PlanError::empty(goal).into());
        }
        info!(goal, steps = plan.len(), "Created plan");
        Ok(plan)
    }
}

/// Parse a planner reply into a [`Plan`].
///
/// Text around the `<plan>` element is ignored. Step descriptions are taken
/// from `tools` when the named function exists there.
///
/// # Errors
///
/// Returns [`PlanError::Parse`] if the reply holds no `<plan>` element or
/// the element is not well-formed XML.
pub fn parse_plan(goal: &str, reply: &str, tools: &ToolSet) -> std::result::Result<Plan, PlanError> {
    let xml = extract_plan_element(reply)
        .ok_or_else(|| PlanError::parse("reply does not contain a <plan> element"))?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut steps = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                if let Some(step) = parse_step(&e, tools)? {
                    steps.push(step);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(PlanError::parse(format!(
                    "invalid plan XML at position {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    Ok(Plan::new(goal, steps))
}

fn parse_step(element: &BytesStart<'_>, tools: &ToolSet) -> std::result::Result<Option<Step>, PlanError> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let Some(reference) = name.strip_prefix(FUNCTION_PREFIX) else {
        return Ok(None);
    };

    let description = tools
        .get(reference)
        .map(|t| t.description().to_owned())
        .unwrap_or_default();
    let mut step = Step::new(reference).with_description(description);

    for attr in element.attributes() {
        let attr = attr.map_err(|e| PlanError::parse(format!("bad attribute on {name}: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| PlanError::parse(format!("bad value for {key} on {name}: {e}")))?;

        if key == "setContextVariable" || key == "appendToResult" {
            step = step.with_output_variable(value.into_owned());
        } else {
            step = step.with_parameter(key, value.into_owned());
        }
    }

    Ok(Some(step))
}

/// Slice out `<plan ...>...</plan>` or a self-closing `<plan/>`.
fn extract_plan_element(reply: &str) -> Option<&str> {
    let start = reply.find("<plan")?;
    let rest = &reply[start..];
    if let Some(end) = rest.find("</plan>") {
        return Some(&rest[..end + "</plan>".len()]);
    }
    let close = rest.find('>')?;
    rest[..close].ends_with('/').then(|| &rest[..=close])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::Error;
    use crate::llms::MockChatProvider;
    use crate::tools::math;

    fn math_tools() -> ToolSet {
        let mut tools = ToolSet::new();
        tools.import_plugin(math::PLUGIN_NAME, math::plugin()).unwrap();
        tools
    }

    mod parsing {
        use super::*;

        #[test]
        fn parses_steps_and_variables() {
            let reply = r#"Here is the plan:
<plan>
  <function.MathPlugin.Add input="2" number2="3" setContextVariable="SUM"/>
  <function.MathPlugin.Subtract input="$SUM" number2="1"/>
</plan><!-- END -->"#;
            let plan = parse_plan("goal", reply, &math_tools()).unwrap();

            assert_eq!(plan.len(), 2);
            assert_eq!(plan.steps[0].tool, "MathPlugin.Add");
            assert_eq!(plan.steps[0].output_variable.as_deref(), Some("SUM"));
            assert_eq!(plan.steps[0].description, "Adds two numbers together");
            assert_eq!(plan.steps[1].parameters.get("input"), Some("$SUM"));
        }

        #[test]
        fn unescapes_attribute_values() {
            let reply = r#"<plan><function.MathPlugin.Add input="1&amp;2" number2="3"/></plan>"#;
            let plan = parse_plan("g", reply, &math_tools()).unwrap();
            assert_eq!(plan.steps[0].parameters.get("input"), Some("1&2"));
        }

        #[test]
        fn self_closing_plan_is_empty() {
            let plan = parse_plan("g", "I cannot do that. <plan/>", &math_tools()).unwrap();
            assert!(plan.is_empty());
        }

        #[test]
        fn unknown_function_is_kept() {
            let reply = r#"<plan><function.MathPlugin.Modulo input="7" number2="2"/></plan>"#;
            let plan = parse_plan("g", reply, &math_tools()).unwrap();
            assert_eq!(plan.steps[0].tool, "MathPlugin.Modulo");
            assert!(plan.steps[0].description.is_empty());
        }

        #[test]
        fn non_function_elements_are_ignored() {
            let reply = r#"<plan><note>think</note><function.MathPlugin.Sqrt number="9"/></plan>"#;
            let plan = parse_plan("g", reply, &math_tools()).unwrap();
            assert_eq!(plan.len(), 1);
        }

        #[test]
        fn missing_plan_element() {
            let err = parse_plan("g", "The answer is 4.", &math_tools()).unwrap_err();
            assert!(matches!(err, PlanError::Parse(_)));
        }

        #[test]
        fn malformed_xml() {
            let reply = r#"<plan><function.MathPlugin.Add input="2 number2="3"/></plan>"#;
            assert!(matches!(
                parse_plan("g", reply, &math_tools()),
                Err(PlanError::Parse(_))
            ));
        }
    }

    mod planner {
        use super::*;
        use std::time::Duration;

        #[test]
        fn prompt_contains_manual_and_goal() {
            let prompt = SequentialPlanner::prompt("What is 2 + 3?", &math_tools());
            assert!(prompt.contains("MathPlugin.Multiply:"));
            assert!(prompt.contains("<goal>What is 2 + 3?</goal>"));
        }

        #[tokio::test]
        async fn creates_and_runs_plan() {
            let provider = Arc::new(MockChatProvider::new([r#"<plan>
                <function.MathPlugin.Add input="2" number2="3"/>
                <function.MathPlugin.Subtract number2="1"/>
            </plan>"#]));
            let planner = SequentialPlanner::new(Arc::clone(&provider) as SharedChatProvider);
            let tools = math_tools();

            let mut plan = planner.create_plan("add 2 and 3 then subtract 1", &tools).await.unwrap();
            assert_eq!(plan.invoke(&tools).unwrap(), "4.0");

            let requests = provider.requests();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].temperature, Some(0.0));
        }

        #[tokio::test]
        async fn empty_reply_is_empty_plan() {
            let planner = SequentialPlanner::new(Arc::new(MockChatProvider::new(["<plan></plan>"])));
            let err = planner.create_plan("write a poem", &math_tools()).await.unwrap_err();
            assert!(matches!(err, Error::Plan(PlanError::Empty { .. })));
        }

        #[tokio::test]
        async fn empty_tool_set_skips_the_model() {
            let provider = Arc::new(MockChatProvider::new(["unused"]));
            let planner = SequentialPlanner::new(Arc::clone(&provider) as SharedChatProvider);
            let err = planner.create_plan("anything", &ToolSet::new()).await.unwrap_err();
            assert!(matches!(err, Error::Plan(PlanError::Empty { .. })));
            assert_eq!(provider.call_count(), 0);
        }

        #[tokio::test(start_paused = true)]
        async fn planning_call_times_out() {
            let provider = MockChatProvider::new(["<plan/>"]).with_delay(Duration::from_secs(60));
            let planner =
                SequentialPlanner::new(Arc::new(provider)).with_timeout(Duration::from_secs(1));
            let err = planner.create_plan("2+2", &math_tools()).await.unwrap_err();
            assert!(matches!(err, Error::Llm(ref e) if e.is_retryable()));
        }
    }
}
