//! `conclave career`: a career planner and a job finder talk until the job
//! finder approves a plan.

use std::sync::Arc;
use std::time::Duration;

use conclave::agents::{
    AgentDefinition, AgentScope, AgentService, AzureAgentsClient, BingGrounding,
    RemoteAgentResponder,
};
use conclave::chat::SharedChatProvider;
use conclave::conversation::{
    ApprovalTermination, ChatResponder, ConversationLoop, ConversationState, Responder,
};
use conclave::llms::OpenAI;
use conclave::message::Message;
use tracing::info;

use crate::config::{ConfigError, Settings};
use crate::error::Result;

/// Name of the agent proposing career paths.
pub const CAREER_PLANNER_NAME: &str = "CareerPlannerAgent";

/// Name of the agent searching for postings; only it may approve.
pub const JOB_FINDER_NAME: &str = "JobSearchAgent";

/// Turn ceiling for this scenario.
pub const MAXIMUM_ITERATIONS: usize = 20;

/// Seed question.
pub const DEFAULT_QUESTION: &str = "I have skills in data analysis, Python programming, and environmental science. What career paths should I consider? Also find relevant jobs for me in the market.";

const CAREER_PLANNER_INSTRUCTIONS: &str = "
You are a career planner agent. Your task is to analyze a candidate's skills,
experiences, and interests, and suggest suitable career paths. Clearly list
potential career options and briefly explain why each is suitable based on
the candidate's skills. Once this is done, trigger the JobSearchAgent to find
relevant job postings.

If recommendations are provided to adapt the career path, then use these
recommendations to refine the career path and provide the refined career path to the JobSearchAgent.
Whenever feedback is present, it is prefixed with the word Feedback:
";

const JOB_FINDER_INSTRUCTIONS: &str = "
You are a job search agent who finds job postings in Munich, Germany matching the
career paths suggested by the CareerPlannerAgent.
You strictly use the Bing Web Search tool to do this. Do not provide job openings
from your memory. Provide links to actual job postings, clearly list job titles, companies, and key requirements.
Do not invent any details. This is deadly serious.

Assess the career path based on the job postings you find. Give a score between 1 and 10,
with 10 being the best. If the score is below 5, provide feedback to the CareerPlannerAgent.
Prefix feedback with the word Feedback:

If the score is more than 5, create a structured learning plan based on the career options
provided by the CareerPlannerAgent, and the job postings.
You strictly use the Bing Web Search tool to do this.
Your plan should include:
- Recommended learning resources.
- Actionable preparation tips.
- Actionable interview preparation tips.
- Clear next steps.

Once the plan is complete:
- Provide it to the user, while using the word \"Approved Plan\" in the message.
Do not use the word \"approve\" or \"approved\" unless you are giving approval.
";

/// Options for one run.
#[derive(Debug, Clone)]
pub struct CareerOptions {
    /// Seed question.
    pub question: String,
    /// Turn ceiling.
    pub maximum_iterations: usize,
    /// Per-turn timeout.
    pub turn_timeout: Option<Duration>,
}

impl CareerOptions {
    /// Defaults from settings. The scenario's own ceiling applies unless
    /// one is configured.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            question: DEFAULT_QUESTION.to_owned(),
            maximum_iterations: settings
                .conversation
                .maximum_iterations
                .unwrap_or(MAXIMUM_ITERATIONS),
            turn_timeout: settings.conversation.turn_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Run the scenario on hosted agents when a project is configured, or on
/// the completion service otherwise.
pub async fn run(settings: &Settings, options: &CareerOptions) -> Result<()> {
    if let Some(config) = settings.agents_config()? {
        let bing_connection = settings.agents.bing_connection.as_deref().ok_or_else(|| {
            ConfigError::MissingField("agents.bing_connection (BING_CONNECTION_NAME)".into())
        })?;
        let service: Arc<dyn AgentService> = Arc::new(AzureAgentsClient::new(config)?);
        return run_hosted(&service, bing_connection, options).await;
    }

    info!("No agent project configured, running on the completion service");
    let provider: SharedChatProvider = Arc::new(OpenAI::new(settings.completion_config()?)?);
    let roster: Vec<Arc<dyn Responder>> = vec![
        Arc::new(ChatResponder::new(
            CAREER_PLANNER_NAME,
            CAREER_PLANNER_INSTRUCTIONS,
            Arc::clone(&provider),
        )),
        Arc::new(ChatResponder::new(
            JOB_FINDER_NAME,
            JOB_FINDER_INSTRUCTIONS,
            provider,
        )),
    ];
    Ok(converse(roster, options).await?)
}

/// Create both agents for the duration of the conversation. The job finder
/// is grounded on the named Bing connection.
pub async fn run_hosted(
    service: &Arc<dyn AgentService>,
    bing_connection: &str,
    options: &CareerOptions,
) -> Result<()> {
    let connection = service.get_connection(bing_connection).await?;
    let job_finder = AgentDefinition::new(JOB_FINDER_NAME, JOB_FINDER_INSTRUCTIONS)
        .with_tool(BingGrounding::new(connection.id).into());
    let definitions = vec![
        AgentDefinition::new(CAREER_PLANNER_NAME, CAREER_PLANNER_INSTRUCTIONS),
        job_finder,
    ];

    let inner = Arc::clone(service);
    AgentScope::run(service, definitions, |agents| async move {
        let roster: Vec<Arc<dyn Responder>> = agents
            .into_iter()
            .map(|handle| {
                Arc::new(RemoteAgentResponder::new(Arc::clone(&inner), handle))
                    as Arc<dyn Responder>
            })
            .collect();
        converse(roster, options).await
    })
    .await?;
    Ok(())
}

/// Drive the group chat and print the transcript.
///
/// The conversation is reset on every exit path.
pub async fn converse(
    roster: Vec<Arc<dyn Responder>>,
    options: &CareerOptions,
) -> conclave::Result<()> {
    let policy = ApprovalTermination::new().for_agents([JOB_FINDER_NAME]);
    let mut chat = ConversationLoop::new(roster, policy)?
        .with_maximum_iterations(options.maximum_iterations);
    if let Some(timeout) = options.turn_timeout {
        chat = chat.with_turn_timeout(timeout);
    }

    let seed = Message::user(&options.question);
    println!("# {}: '{}'", seed.role(), seed.content());
    chat.add_message(seed);

    let outcome = async {
        while !chat.is_complete() {
            let turn = chat.advance().await?;
            println!("{}", turn.message);
        }
        println!("# IS COMPLETE: {}", chat.is_complete());
        print!("{}", render_history(chat.state()));
        Ok::<_, conclave::Error>(())
    }
    .await;

    println!("Cleaning up...");
    chat.reset();
    outcome
}

/// The rule and the history, newest first.
fn render_history(state: &ConversationState) -> String {
    let mut out = format!("{}\nChat History (In Descending Order):\n\n", "*".repeat(60));
    for message in state.history_descending() {
        out.push_str(&message.to_string());
        out.push('\n');
    }
    out
}
