//! OpenAI client configuration.

use crate::chat::CompletionMode;
use crate::error::{Error, LlmError, Result};

/// Which API dialect the endpoint speaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiFlavor {
    /// `api.openai.com` or a compatible server: bearer auth, model in the body.
    OpenAI,
    /// Azure OpenAI: `api-key` header, deployment in the path, versioned query.
    Azure {
        /// Value of the `api-version` query parameter.
        api_version: String,
    },
}

/// Configuration for the OpenAI client.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API, or the Azure resource endpoint.
    pub base_url: String,
    /// Default model, or the Azure deployment name.
    pub model: String,
    /// API dialect.
    pub flavor: ApiFlavor,
    /// Request shape.
    pub mode: CompletionMode,
    /// Optional organization ID.
    pub organization: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl OpenAIConfig {
    /// Default OpenAI API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";
    /// Default Azure OpenAI API version.
    pub const DEFAULT_AZURE_API_VERSION: &'static str = "2024-06-01";

    /// Creates a new configuration with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Creates config for an Azure OpenAI deployment.
    #[must_use]
    pub fn azure(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: endpoint.into().trim_end_matches('/').to_owned(),
            model: deployment.into(),
            flavor: ApiFlavor::Azure {
                api_version: Self::DEFAULT_AZURE_API_VERSION.to_owned(),
            },
            ..Self::default()
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Reads from:
    /// - `OPENAI_API_KEY` - Required API key
    /// - `OPENAI_BASE_URL` - Optional base URL
    /// - `OPENAI_MODEL` - Optional default model
    /// - `OPENAI_ORGANIZATION` - Optional organization ID
    /// - `OPENAI_MODE` - Optional `chat-completion` / `text-completion`
    ///
    /// # Errors
    ///
    /// Fails if the API key is unset or the mode is not recognized.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates Azure configuration from environment variables.
    ///
    /// Reads from:
    /// - `AZURE_OPENAI_ENDPOINT` - Required resource endpoint
    /// - `AZURE_OPENAI_API_KEY` - Required API key
    /// - `AZURE_OPENAI_DEPLOYMENT` - Required deployment name
    /// - `AZURE_OPENAI_API_VERSION` - Optional API version
    /// - `AZURE_OPENAI_MODE` - Optional `chat-completion` / `text-completion`
    ///
    /// # Errors
    ///
    /// Fails if a required variable is unset or the mode is not recognized.
    pub fn azure_from_env() -> Result<Self> {
        Self::azure_from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| LlmError::auth("openai", "OPENAI_API_KEY environment variable not set"))?;

        let mut config = Self::new(api_key);
        if let Some(url) = get("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = get("OPENAI_MODEL") {
            config.model = model;
        }
        config.organization = get("OPENAI_ORGANIZATION");
        if let Some(mode) = get("OPENAI_MODE") {
            config.mode = mode.parse()?;
        }
        Ok(config)
    }

    pub(crate) fn azure_from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            get(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::config(format!("{key} environment variable not set")))
        };

        let mut config = Self::azure(
            require("AZURE_OPENAI_ENDPOINT")?,
            require("AZURE_OPENAI_API_KEY")?,
            require("AZURE_OPENAI_DEPLOYMENT")?,
        );
        if let Some(version) = get("AZURE_OPENAI_API_VERSION") {
            config = config.with_api_version(version);
        }
        if let Some(mode) = get("AZURE_OPENAI_MODE") {
            config.mode = mode.parse()?;
        }
        Ok(config)
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the default model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the request shape.
    #[must_use]
    pub const fn with_mode(mut self, mode: CompletionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the Azure API version. Has no effect on the OpenAI flavor.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        if let ApiFlavor::Azure { api_version } = &mut self.flavor {
            *api_version = version.into();
        }
        self
    }

    /// Sets the organization ID.
    #[must_use]
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Whether this configuration targets Azure OpenAI.
    #[must_use]
    pub const fn is_azure(&self) -> bool {
        matches!(self.flavor, ApiFlavor::Azure { .. })
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            model: Self::DEFAULT_MODEL.to_owned(),
            flavor: ApiFlavor::OpenAI,
            mode: CompletionMode::default(),
            organization: None,
            timeout_secs: Some(120),
        }
    }
}
