//! Chat types and the completion provider trait.
//!
//! This module provides:
//! - [`ChatRequest`]: Request parameters for a completion
//! - [`ChatResponse`]: The completion text plus any tool-call intent
//! - [`ChatProvider`]: Core trait for hosted completion services
//! - [`CompletionMode`]: Chat-shaped or prompt-shaped requests
//!
//! # Example
//!
//! ```rust,ignore
//! use conclave::prelude::*;
//!
//! let request = ChatRequest::new("gpt-4o")
//!     .system("You are helpful.")
//!     .user("Hello!")
//!     .max_tokens(100);
//!
//! let response = provider.chat(&request).await?;
//! println!("{}", response.text());
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, LlmError};
use crate::message::Message;
use crate::tool::{ToolArguments, ToolDefinition};

/// Request shape used against the completion endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionMode {
    /// Role-tagged message list (`/chat/completions`).
    #[default]
    ChatCompletion,
    /// Single prompt string (`/completions`).
    TextCompletion,
}

impl CompletionMode {
    /// Returns the configuration string for this mode.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ChatCompletion => "chat-completion",
            Self::TextCompletion => "text-completion",
        }
    }
}

impl fmt::Display for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "chat-completion" => Ok(Self::ChatCompletion),
            "text-completion" => Ok(Self::TextCompletion),
            other => Err(Error::config(format!(
                "unknown completion mode '{other}', expected 'chat-completion' or 'text-completion'"
            ))),
        }
    }
}

/// A completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model or deployment identifier; empty selects the provider default.
    #[serde(default)]
    pub model: String,

    /// Conversation messages.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 to 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Stop sequences.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,

    /// Tools the model may express an intent to call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

impl ChatRequest {
    /// Creates a new request with the specified model.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Creates a request with messages.
    #[must_use]
    pub fn with_messages(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    /// Adds a system message.
    #[must_use]
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    /// Adds a user message.
    #[must_use]
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    /// Adds a message.
    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Sets max tokens.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets top-p.
    #[must_use]
    pub const fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Sets stop sequences.
    #[must_use]
    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Sets the available tools.
    #[must_use]
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = (!tools.is_empty()).then_some(tools);
        self
    }

    /// Flatten the messages into a single prompt for text completion.
    ///
    /// System text comes first, followed by each message on its own line;
    /// named messages are prefixed with their author.
    #[must_use]
    pub fn to_prompt(&self) -> String {
        self.messages
            .iter()
            .map(|m| match m.name() {
                Some(name) => format!("{name}: {}", m.content()),
                None => m.content().to_owned(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A tool call the model asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallIntent {
    /// Provider-assigned call id.
    pub id: String,
    /// Function name as given in the request's tool definitions.
    pub name: String,
    /// Raw JSON argument string.
    pub arguments: String,
}

impl ToolCallIntent {
    /// Decode the argument string into string-typed tool arguments.
    ///
    /// Non-string JSON values are kept in their JSON text form.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the argument string is not a JSON object.
    pub fn tool_arguments(&self) -> serde_json::Result<ToolArguments> {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&self.arguments)?;
        Ok(map
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect())
    }
}

/// Token usage statistics reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Prompt tokens.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Completion tokens.
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens.
    #[serde(default)]
    pub total_tokens: u32,
}

/// A completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated message.
    pub message: Message,

    /// Tool calls the model asked for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallIntent>,

    /// Why the model stopped generating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    /// Token usage statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Model identifier used for this response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatResponse {
    /// Creates a new response with a message.
    #[must_use]
    pub const fn new(message: Message) -> Self {
        Self {
            message,
            tool_calls: Vec::new(),
            finish_reason: None,
            usage: None,
            model: None,
        }
    }

    /// Creates a response from text content.
    #[must_use]
    pub fn from_text(content: impl Into<String>) -> Self {
        Self::new(Message::assistant(content))
    }

    /// Sets the tool calls.
    #[must_use]
    pub fn with_tool_calls(mut self, calls: Vec<ToolCallIntent>) -> Self {
        self.tool_calls = calls;
        self
    }

    /// Sets the finish reason.
    #[must_use]
    pub fn with_finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.finish_reason = Some(reason.into());
        self
    }

    /// Sets usage statistics.
    #[must_use]
    pub const fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Returns the text content of the response.
    #[must_use]
    pub fn text(&self) -> &str {
        self.message.content()
    }

    /// Returns `true` if the response contains tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Trait for hosted completion services.
///
/// Every call crosses the network; callers bound it with a timeout.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a completion request and receive a complete response.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Get the name of this provider.
    ///
    /// Used for error messages and logging.
    fn provider_name(&self) -> &'static str;

    /// Get the default model or deployment for this provider.
    fn default_model(&self) -> &str;

    /// The request shape this provider sends.
    fn mode(&self) -> CompletionMode {
        CompletionMode::ChatCompletion
    }
}

/// Extension trait for `ChatProvider` with convenience methods.
#[async_trait]
pub trait ChatProviderExt: ChatProvider {
    /// Send a simple text prompt and get a text response.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(self.default_model()).user(prompt);
        let response = self.chat(&request).await?;
        Ok(response.text().to_owned())
    }

    /// Send a prompt with a system instruction.
    async fn complete_with_system(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest::new(self.default_model())
            .system(system)
            .user(prompt);
        let response = self.chat(&request).await?;
        Ok(response.text().to_owned())
    }
}

impl<T: ChatProvider + ?Sized> ChatProviderExt for T {}

/// Type alias for an Arc-wrapped `ChatProvider`.
pub type SharedChatProvider = Arc<dyn ChatProvider>;
