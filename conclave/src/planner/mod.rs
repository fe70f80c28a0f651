//! Goal decomposition into tool calls.
//!
//! A [`Planner`] turns a natural-language goal into a [`Plan`]; the plan is
//! then run locally against a [`ToolSet`]. Planning is the only step that
//! crosses the network.
//!
//! # Example
//!
//! ```rust,ignore
//! use conclave::prelude::*;
//!
//! let mut tools = ToolSet::new();
//! tools.import_plugin(math::PLUGIN_NAME, math::plugin())?;
//!
//! let planner = SequentialPlanner::new(provider);
//! let goal = format!("{ANSWER_GOAL_PREFIX}{question}");
//! let mut plan = planner.create_plan(&goal, &tools).await?;
//! let result = plan.invoke(&tools)?;
//! ```

mod plan;
mod sequential;

use async_trait::async_trait;

use crate::error::Result;
use crate::tool::ToolSet;

pub use plan::{INPUT_VARIABLE, Plan, Step, StepState};
pub use sequential::{SequentialPlanner, parse_plan};

/// Prefix that frames a user question as a goal for the planner.
pub const ANSWER_GOAL_PREFIX: &str =
    "Answer the user's question with the available capabilities: ";

/// Creates plans from goals.
///
/// Implementations report "no applicable tool" as
/// [`PlanError::Empty`](crate::error::PlanError::Empty) and never rewrite a
/// step that names a tool the set lacks.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Decompose `goal` into steps over `tools`.
    async fn create_plan(&self, goal: &str, tools: &ToolSet) -> Result<Plan>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tools::math;

    /// Returns the same plan for every goal.
    struct FixedPlanner(Plan);

    #[async_trait]
    impl Planner for FixedPlanner {
        async fn create_plan(&self, goal: &str, _tools: &ToolSet) -> Result<Plan> {
            Ok(Plan::new(goal, self.0.steps.clone()))
        }
    }

    #[tokio::test]
    async fn planner_trait_is_object_safe() {
        let planner: Box<dyn Planner> = Box::new(FixedPlanner(
            Plan::default().with_step(Step::new("Sqrt").with_parameter("number", "4")),
        ));
        let mut tools = ToolSet::new();
        tools.import_plugin(math::PLUGIN_NAME, math::plugin()).unwrap();

        let goal = format!("{ANSWER_GOAL_PREFIX}What is the square root of 4?");
        let mut plan = planner.create_plan(&goal, &tools).await.unwrap();
        assert!(plan.goal.starts_with("Answer the user's question"));
        assert_eq!(plan.invoke(&tools).unwrap(), "2.0");
    }
}
