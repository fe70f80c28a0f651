//! Conversation participants.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::chat::{ChatRequest, SharedChatProvider};
use crate::error::LlmError;
use crate::message::Message;
use crate::tool::ToolDefinition;

/// A named participant that replies to a conversation history.
///
/// Each call is one remote round trip. Implementations must not retry
/// internally; the conversation loop surfaces failures to its caller.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Participant name, unique within a roster.
    fn name(&self) -> &str;

    /// Produce the next reply given the full history so far.
    async fn respond(&self, history: &[Message]) -> Result<String, LlmError>;
}

/// A responder backed directly by a [`ChatProvider`](crate::chat::ChatProvider).
///
/// The history is replayed after the instructions: this responder's own
/// earlier turns go in as `assistant`, everything else as `user` with its
/// author attached.
#[derive(Clone)]
pub struct ChatResponder {
    name: String,
    instructions: String,
    provider: SharedChatProvider,
    tools: Vec<ToolDefinition>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl ChatResponder {
    /// Create a responder called `name` following `instructions`.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        provider: SharedChatProvider,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            provider,
            tools: Vec::new(),
            max_tokens: None,
            temperature: None,
        }
    }

    /// Offer tool definitions the model may ask to call.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set max tokens per reply.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// The instructions sent as the system message.
    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Build the request for `history`.
    #[must_use]
    pub fn request(&self, history: &[Message]) -> ChatRequest {
        let mut request = ChatRequest::new(self.provider.default_model())
            .system(&self.instructions)
            .tools(self.tools.clone());
        request.max_tokens = self.max_tokens;
        request.temperature = self.temperature;

        for msg in history {
            let mapped = if msg.is_from(&self.name) {
                Message::assistant(msg.content())
            } else {
                let user = Message::user(msg.content());
                match msg.name() {
                    Some(author) => user.with_name(author),
                    None => user,
                }
            };
            request = request.message(mapped);
        }
        request
    }
}

impl std::fmt::Debug for ChatResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatResponder")
            .field("name", &self.name)
            .field("provider", &self.provider.provider_name())
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Responder for ChatResponder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, history: &[Message]) -> Result<String, LlmError> {
        let response = self.provider.chat(&self.request(history)).await?;
        Ok(response.text().to_owned())
    }
}

/// A responder that replays canned replies, cycling through them.
///
/// Useful for tests and dry runs.
#[derive(Debug)]
pub struct ScriptedResponder {
    name: String,
    replies: Vec<String>,
    index: AtomicUsize,
    failure: Option<LlmError>,
    delay: Option<Duration>,
}

impl ScriptedResponder {
    /// Create a responder that answers with `replies` in order.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            replies: replies.into_iter().map(Into::into).collect(),
            index: AtomicUsize::new(0),
            failure: None,
            delay: None,
        }
    }

    /// Create a responder whose every call fails with `error`.
    #[must_use]
    pub fn failing(name: impl Into<String>, error: LlmError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(name, Vec::<String>::new())
        }
    }

    /// Wait `delay` before each reply.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn respond(&self, _history: &[Message]) -> Result<String, LlmError> {
        let index = self.index.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self
            .replies
            .get(index % self.replies.len().max(1))
            .cloned()
            .unwrap_or_default())
    }
}
