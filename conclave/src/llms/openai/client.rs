//! OpenAI API client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use crate::chat::{ChatRequest, CompletionMode};
use crate::error::{LlmError, Result};
use crate::message::Message;

use super::config::{ApiFlavor, OpenAIConfig};
use super::types::{OpenAIChatRequest, OpenAIErrorResponse, OpenAIMessage, OpenAITextRequest};

/// OpenAI API client.
///
/// Talks to either `api.openai.com` (or a compatible server) or an Azure
/// OpenAI deployment, depending on [`OpenAIConfig::flavor`].
#[derive(Debug, Clone)]
pub struct OpenAI {
    pub(crate) config: Arc<OpenAIConfig>,
    pub(crate) client: Client,
}

impl OpenAI {
    /// Create a new OpenAI client with the given configuration.
    ///
    /// # Errors
    ///
    /// Fails if the API key is empty or the HTTP client cannot be built.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::auth(Self::name_for(&config), "API key is required").into());
        }

        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| LlmError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    /// Create a client from `OPENAI_*` environment variables.
    ///
    /// # Errors
    ///
    /// See [`OpenAIConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env()?)
    }

    /// Create a client from `AZURE_OPENAI_*` environment variables.
    ///
    /// # Errors
    ///
    /// See [`OpenAIConfig::azure_from_env`].
    pub fn azure_from_env() -> Result<Self> {
        Self::new(OpenAIConfig::azure_from_env()?)
    }

    fn name_for(config: &OpenAIConfig) -> &'static str {
        match config.flavor {
            ApiFlavor::OpenAI => "openai",
            ApiFlavor::Azure { .. } => "azure-openai",
        }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get the default model (the deployment name for Azure).
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub(crate) fn provider(&self) -> &'static str {
        Self::name_for(&self.config)
    }

    /// Build the completion URL for the configured flavor and mode.
    pub(crate) fn completion_url(&self) -> String {
        let path = match self.config.mode {
            CompletionMode::ChatCompletion => "chat/completions",
            CompletionMode::TextCompletion => "completions",
        };
        match &self.config.flavor {
            ApiFlavor::OpenAI => format!("{}/{path}", self.config.base_url),
            ApiFlavor::Azure { api_version } => format!(
                "{}/openai/deployments/{}/{path}?api-version={api_version}",
                self.config.base_url, self.config.model
            ),
        }
    }

    /// Build request headers for JSON requests.
    pub(crate) fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .post(url)
            .header("Content-Type", "application/json");

        let mut req = match self.config.flavor {
            ApiFlavor::OpenAI => {
                req.header("Authorization", format!("Bearer {}", self.config.api_key))
            }
            ApiFlavor::Azure { .. } => req.header("api-key", &self.config.api_key),
        };

        if let Some(org) = &self.config.organization {
            req = req.header("OpenAI-Organization", org);
        }

        req
    }

    /// Convert Message to OpenAI format.
    pub(crate) fn convert_message(msg: &Message) -> OpenAIMessage {
        OpenAIMessage {
            role: msg.role().as_str().to_owned(),
            content: Some(msg.content().to_owned()),
            name: msg.name().map(sanitize_name),
            tool_calls: None,
        }
    }

    /// Model field for the body. Azure selects the model by deployment path.
    fn body_model(&self, request: &ChatRequest) -> Option<String> {
        match self.config.flavor {
            ApiFlavor::Azure { .. } => None,
            ApiFlavor::OpenAI if request.model.is_empty() => Some(self.config.model.clone()),
            ApiFlavor::OpenAI => Some(request.model.clone()),
        }
    }

    /// Build the chat completion request body.
    pub(crate) fn build_chat_body(&self, request: &ChatRequest) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.body_model(request),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop.clone(),
            tools: request.tools.clone(),
        }
    }

    /// Build the text completion request body.
    pub(crate) fn build_text_body(&self, request: &ChatRequest) -> OpenAITextRequest {
        OpenAITextRequest {
            model: self.body_model(request),
            prompt: request.to_prompt(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            stop: request.stop.clone(),
        }
    }

    /// Parse an error response.
    pub(crate) fn parse_error(&self, status: u16, body: &str) -> LlmError {
        let provider = self.provider();
        if let Ok(error_response) = serde_json::from_str::<OpenAIErrorResponse>(body) {
            let error = error_response.error;
            let code = error
                .code
                .or(error.error_type)
                .unwrap_or_else(|| status.to_string());

            return match status {
                401 | 403 => LlmError::auth(provider, error.message),
                429 => LlmError::rate_limited(provider),
                400 if code == "context_length_exceeded" => {
                    LlmError::context_exceeded(error.message).or_provider(provider)
                }
                400 => LlmError::invalid_request(error.message).or_provider(provider),
                _ => LlmError::provider_code(provider, code, error.message),
            };
        }

        LlmError::http_status(status, body.to_owned()).or_provider(provider)
    }
}

/// OpenAI restricts `name` to `[a-zA-Z0-9_-]{1,64}`.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}
