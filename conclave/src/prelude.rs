//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```rust,ignore
//! use conclave::prelude::*;
//! ```

pub use std::sync::Arc;

pub use crate::agents::{
    AgentDefinition, AgentHandle, AgentScope, AgentService, AgentsConfig, AzureAgentsClient,
    BingGrounding, Connection, ProjectConnection, RemoteAgentResponder,
};
pub use crate::chat::{
    ChatProvider, ChatProviderExt, ChatRequest, ChatResponse, CompletionMode, SharedChatProvider,
    ToolCallIntent, Usage,
};
pub use crate::conversation::{
    ApprovalTermination, ChatResponder, ConversationLoop, ConversationState, MaxIterations, Never,
    Responder, ScriptedResponder, TerminationPolicy, TerminationPolicyExt, Turn,
};
pub use crate::error::{
    Error, LlmError, LlmErrorKind, PlanError, ResponderError, Result, ToolError,
};
pub use crate::llms::{ApiFlavor, MockChatProvider, OpenAI, OpenAIConfig};
pub use crate::message::{Message, Role};
pub use crate::planner::{
    ANSWER_GOAL_PREFIX, Plan, Planner, SequentialPlanner, Step, StepState,
};
pub use crate::tool::{ToolArguments, ToolDefinition, ToolDescriptor, ToolResult, ToolSet};
pub use crate::tools::math;
