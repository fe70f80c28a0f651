//! `conclave math`: plan and run a math question against the math plugin.

use std::sync::Arc;
use std::time::Duration;

use conclave::chat::SharedChatProvider;
use conclave::llms::OpenAI;
use conclave::planner::{ANSWER_GOAL_PREFIX, Plan, Planner, SequentialPlanner};
use conclave::tool::ToolSet;
use conclave::tools::math;
use tracing::info;

use crate::config::Settings;
use crate::error::Result;

/// Build the tool set the planner chooses from.
pub fn math_tools() -> Result<ToolSet> {
    let mut tools = ToolSet::new();
    tools
        .import_plugin(math::PLUGIN_NAME, math::plugin())
        .map_err(conclave::Error::from)?;
    Ok(tools)
}

/// Plan and execute `question`, printing the step trace.
pub async fn run(settings: &Settings, question: &str) -> Result<String> {
    let config = settings.completion_config()?;
    info!(model = %config.model, mode = %config.mode, "Using completion service");
    let provider: SharedChatProvider = Arc::new(OpenAI::new(config)?);

    let planner = SequentialPlanner::new(provider).with_timeout(Duration::from_secs(120));
    solve(&planner, question).await
}

/// Plan `question` with `planner` and run the plan.
pub async fn solve(planner: &impl Planner, question: &str) -> Result<String> {
    let tools = math_tools()?;
    let goal = format!("{ANSWER_GOAL_PREFIX}{question}");

    let mut plan = planner.create_plan(&goal, &tools).await?;
    let result = plan.invoke(&tools)?;

    print!("{}", render_trace(&plan));
    println!("Result: {result}");
    Ok(result)
}

/// One `<description> : <state>` line per executed step.
fn render_trace(plan: &Plan) -> String {
    plan.steps
        .iter()
        .filter_map(|step| {
            step.state
                .as_ref()
                .map(|state| format!("{} : {state}\n", step.description))
        })
        .collect()
}
