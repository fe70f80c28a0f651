//! OpenAI ChatProvider implementation.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::chat::{ChatProvider, ChatRequest, ChatResponse, CompletionMode, ToolCallIntent};
use crate::error::LlmError;
use crate::message::Message;

use super::client::OpenAI;
use super::types::{OpenAIChatResponse, OpenAITextResponse};

impl OpenAI {
    /// Parse a chat completion response into a [`ChatResponse`].
    pub(crate) fn parse_chat_response(
        response: OpenAIChatResponse,
    ) -> Result<ChatResponse, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::response_format("at least one choice", "empty choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallIntent {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let mut parsed = ChatResponse::new(Message::assistant(
            choice.message.content.unwrap_or_default(),
        ))
        .with_tool_calls(tool_calls);
        parsed.finish_reason = choice.finish_reason;
        parsed.usage = response.usage;
        parsed.model = response.model;
        Ok(parsed)
    }

    /// Parse a text completion response into a [`ChatResponse`].
    pub(crate) fn parse_text_response(
        response: OpenAITextResponse,
    ) -> Result<ChatResponse, LlmError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::response_format("at least one choice", "empty choices"))?;

        let mut parsed = ChatResponse::from_text(choice.text.trim());
        parsed.finish_reason = choice.finish_reason;
        parsed.usage = response.usage;
        parsed.model = response.model;
        Ok(parsed)
    }

    async fn post<B: Serialize + Sync, R: DeserializeOwned>(&self, body: &B) -> Result<R, LlmError> {
        let url = self.completion_url();
        debug!(provider = self.provider(), %url, "Sending completion request");

        let response = self
            .build_request(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::from(e).or_provider(self.provider()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &error_text));
        }

        let response_text = response.text().await?;
        serde_json::from_str(&response_text).map_err(|e| {
            LlmError::response_format(
                "valid completion response",
                format!("parse error: {e}, response: {response_text}"),
            )
            .or_provider(self.provider())
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAI {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        match self.config.mode {
            CompletionMode::ChatCompletion => {
                let body = self.build_chat_body(request);
                Self::parse_chat_response(self.post(&body).await?)
            }
            CompletionMode::TextCompletion => {
                if request.tools.is_some() {
                    return Err(LlmError::not_supported("tools with text completion")
                        .or_provider(self.provider()));
                }
                let body = self.build_text_body(request);
                Self::parse_text_response(self.post(&body).await?)
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        self.provider()
    }

    fn default_model(&self) -> &str {
        self.model()
    }

    fn mode(&self) -> CompletionMode {
        self.config.mode
    }
}
