//! Hosted agents.
//!
//! A hosted agent lives on a remote service: it is created from an
//! [`AgentDefinition`], answers thread runs, and must be deleted when the
//! caller is done with it. [`AgentScope`] ties that lifetime to a block of
//! async work.
//!
//! # Example
//!
//! ```rust,ignore
//! use conclave::prelude::*;
//!
//! let service: Arc<dyn AgentService> = Arc::new(AzureAgentsClient::from_env()?);
//! let bing = service.get_connection("my-bing-connection").await?;
//!
//! let finder = AgentDefinition::new("JobSearchAgent", "Find jobs.")
//!     .with_tool(BingGrounding::new(bing.id).into());
//!
//! AgentScope::run(&service, vec![finder], |agents| async move {
//!     // talk to the agents
//!     Ok(())
//! })
//! .await?;
//! ```

mod azure;
mod responder;
mod scope;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::message::Message;

pub use azure::{AgentsConfig, AzureAgentsClient, ProjectConnection};
pub use responder::RemoteAgentResponder;
pub use scope::AgentScope;

/// A connection registered with the hosting project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Fully qualified connection resource id.
    pub id: String,
    /// Connection name.
    pub name: String,
}

/// Web search grounding backed by a Bing connection.
///
/// The remote runtime performs the searches; only the connection id is
/// supplied from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BingGrounding {
    connection_id: String,
}

impl BingGrounding {
    /// Create a grounding tool for `connection_id`.
    #[must_use]
    pub fn new(connection_id: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
        }
    }

    /// The connection id.
    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// The tool definition in the agent service's wire format.
    #[must_use]
    pub fn definition(&self) -> Value {
        serde_json::json!({
            "type": "bing_grounding",
            "bing_grounding": {
                "connections": [{"connection_id": self.connection_id}]
            }
        })
    }
}

impl From<BingGrounding> for Value {
    fn from(tool: BingGrounding) -> Self {
        tool.definition()
    }
}

/// What to create on the agent service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Agent name; also the author name of its messages.
    pub name: String,
    /// System instructions.
    pub instructions: String,
    /// Model deployment; `None` uses the service default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Tool definitions in the service's wire format.
    #[serde(default)]
    pub tools: Vec<Value>,
}

impl AgentDefinition {
    /// Create a definition.
    #[must_use]
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: None,
            tools: Vec::new(),
        }
    }

    /// Set the model deployment.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a tool definition.
    #[must_use]
    pub fn with_tool(mut self, tool: Value) -> Self {
        self.tools.push(tool);
        self
    }
}

/// A created agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentHandle {
    /// Service-assigned id.
    pub id: String,
    /// Agent name.
    pub name: String,
}

/// A remote service hosting agents.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Look up a project connection by name.
    async fn get_connection(&self, name: &str) -> Result<Connection>;

    /// Create an agent.
    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentHandle>;

    /// Delete an agent.
    async fn delete_agent(&self, agent_id: &str) -> Result<()>;

    /// Run `agent` over `history` on a fresh thread and return its reply.
    async fn run_thread(
        &self,
        agent: &AgentHandle,
        history: &[Message],
    ) -> std::result::Result<String, LlmError>;
}
