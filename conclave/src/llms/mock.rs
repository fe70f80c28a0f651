//! Mock chat provider for testing.
//!
//! Returns predefined responses without making network calls, so planners,
//! responders and conversation loops can be exercised offline.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::chat::{ChatProvider, ChatRequest, ChatResponse, CompletionMode};
use crate::error::LlmError;

/// A scripted provider for tests.
///
/// Returns predefined responses in sequence, cycling through them.
///
/// # Example
///
/// ```rust,ignore
/// use conclave::llms::MockChatProvider;
///
/// let provider = MockChatProvider::new(["Hello!", "Goodbye!"]);
/// // First call returns "Hello!", second returns "Goodbye!", third returns "Hello!" again...
/// ```
#[derive(Debug)]
pub struct MockChatProvider {
    model_id: String,
    responses: Vec<String>,
    response_index: AtomicUsize,
    failure: Option<LlmError>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatProvider {
    /// Create a mock provider with predefined responses.
    #[must_use]
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            model_id: "mock-model".to_owned(),
            responses: responses.into_iter().map(Into::into).collect(),
            response_index: AtomicUsize::new(0),
            failure: None,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a provider whose every call fails with `error`.
    #[must_use]
    pub fn failing(error: LlmError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(Vec::<String>::new())
        }
    }

    /// Use a custom model ID.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Sleep for `delay` before answering each call.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.response_index.load(Ordering::SeqCst)
    }

    /// Copies of the requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = &self.failure {
            return Err(err.clone().or_provider(self.provider_name()));
        }

        let response = self
            .responses
            .get(index % self.responses.len().max(1))
            .cloned()
            .unwrap_or_else(|| "No response".to_owned());

        Ok(ChatResponse::from_text(response).with_model(&self.model_id))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn default_model(&self) -> &str {
        &self.model_id
    }

    fn mode(&self) -> CompletionMode {
        CompletionMode::ChatCompletion
    }
}
