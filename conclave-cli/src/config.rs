//! Configuration for the `conclave` binary.
//!
//! Settings are resolved in order:
//! 1. Default values
//! 2. Config file (`~/.conclave/config.toml`, or `--config`)
//! 3. Environment variables

use std::path::{Path, PathBuf};

use conclave::agents::{AgentsConfig, ProjectConnection};
use conclave::chat::CompletionMode;
use conclave::llms::OpenAIConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    /// Missing required field.
    #[error("missing required config: {0}")]
    MissingField(String),
    /// Invalid value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Completion service used by the planner and local responders.
    #[serde(default)]
    pub completion: CompletionSettings,

    /// Hosted agent service.
    #[serde(default)]
    pub agents: AgentSettings,

    /// Group chat limits.
    #[serde(default)]
    pub conversation: ConversationSettings,
}

/// `[completion]` table.
///
/// An `endpoint` selects Azure OpenAI, where `model` is the deployment name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSettings {
    /// Azure OpenAI resource endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Base URL for OpenAI-compatible servers.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key. Prefer the environment.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model, or deployment name on Azure.
    #[serde(default)]
    pub model: Option<String>,
    /// Azure API version.
    #[serde(default)]
    pub api_version: Option<String>,
    /// `chat-completion` or `text-completion`.
    #[serde(default)]
    pub mode: Option<CompletionMode>,
}

/// `[agents]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// `<host>;<subscription>;<resource group>;<project>`.
    #[serde(default)]
    pub connection_string: Option<String>,
    /// Model deployment for created agents.
    #[serde(default)]
    pub model: Option<String>,
    /// Bearer token. Prefer the environment.
    #[serde(default)]
    pub token: Option<String>,
    /// Agents API version.
    #[serde(default)]
    pub api_version: Option<String>,
    /// Name of the Bing connection used for web grounding.
    #[serde(default)]
    pub bing_connection: Option<String>,
}

/// `[conversation]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSettings {
    /// Turn ceiling; each subcommand has its own default.
    #[serde(default)]
    pub maximum_iterations: Option<usize>,
    /// Per-turn timeout.
    #[serde(default)]
    pub turn_timeout_secs: Option<u64>,
}

impl Settings {
    /// Override file values with set, non-empty environment variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let c = &mut self.completion;
        if let Some(v) = get("AZURE_OPENAI_ENDPOINT") {
            c.endpoint = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            c.api_key = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_DEPLOYMENT").or_else(|| get("OPENAI_MODEL")) {
            c.model = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            c.base_url = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_API_VERSION") {
            c.api_version = Some(v);
        }
        if let Some(v) = get("AZURE_OPENAI_MODE").or_else(|| get("OPENAI_MODE")) {
            let mode = v
                .parse()
                .map_err(|e: conclave::Error| ConfigError::InvalidValue(e.to_string()))?;
            c.mode = Some(mode);
        }

        let a = &mut self.agents;
        if let Some(v) = get("AZURE_AI_AGENT_PROJECT_CONNECTION_STRING") {
            a.connection_string = Some(v);
        }
        if let Some(v) = get("AZURE_AI_AGENT_MODEL_DEPLOYMENT_NAME") {
            a.model = Some(v);
        }
        if let Some(v) = get("AZURE_AI_AGENT_TOKEN") {
            a.token = Some(v);
        }
        if let Some(v) = get("AZURE_AI_AGENT_API_VERSION") {
            a.api_version = Some(v);
        }
        if let Some(v) = get("BING_CONNECTION_NAME") {
            a.bing_connection = Some(v);
        }

        if let Some(v) = get("CONCLAVE_MAX_ITERATIONS") {
            let max = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("CONCLAVE_MAX_ITERATIONS={v}")))?;
            self.conversation.maximum_iterations = Some(max);
        }
        Ok(())
    }

    /// Build the completion client configuration.
    pub fn completion_config(&self) -> ConfigResult<OpenAIConfig> {
        let c = &self.completion;
        let api_key = c.api_key.clone().ok_or_else(|| {
            ConfigError::MissingField("completion.api_key (AZURE_OPENAI_API_KEY or OPENAI_API_KEY)".into())
        })?;

        let mut config = match &c.endpoint {
            Some(endpoint) => {
                let deployment = c.model.clone().ok_or_else(|| {
                    ConfigError::MissingField("completion.model (AZURE_OPENAI_DEPLOYMENT)".into())
                })?;
                let mut config = OpenAIConfig::azure(endpoint.as_str(), api_key, deployment);
                if let Some(version) = &c.api_version {
                    config = config.with_api_version(version.as_str());
                }
                config
            }
            None => {
                let mut config = OpenAIConfig::new(api_key);
                if let Some(base_url) = &c.base_url {
                    config = config.with_base_url(base_url.as_str());
                }
                if let Some(model) = &c.model {
                    config = config.with_model(model.as_str());
                }
                config
            }
        };
        if let Some(mode) = c.mode {
            config = config.with_mode(mode);
        }
        Ok(config)
    }

    /// Build the agent service configuration, or `None` when no project is
    /// configured.
    pub fn agents_config(&self) -> ConfigResult<Option<AgentsConfig>> {
        let a = &self.agents;
        let Some(connection) = &a.connection_string else {
            return Ok(None);
        };
        let connection: ProjectConnection = connection
            .parse()
            .map_err(|e: conclave::Error| ConfigError::InvalidValue(e.to_string()))?;
        let model = a.model.clone().ok_or_else(|| {
            ConfigError::MissingField("agents.model (AZURE_AI_AGENT_MODEL_DEPLOYMENT_NAME)".into())
        })?;
        let token = a
            .token
            .clone()
            .ok_or_else(|| ConfigError::MissingField("agents.token (AZURE_AI_AGENT_TOKEN)".into()))?;

        let mut config = AgentsConfig::new(connection, token, model);
        if let Some(version) = &a.api_version {
            config = config.with_api_version(version.as_str());
        }
        Ok(Some(config))
    }
}

/// Get the default config directory path.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".conclave")
}

/// Get the default config file path.
#[must_use]
pub fn config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load settings from `path` (or the default path), then apply the
/// environment.
pub async fn load_settings(path: Option<&Path>) -> ConfigResult<Settings> {
    let explicit = path.is_some();
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let mut settings = if path.exists() {
        let content = tokio::fs::read_to_string(&path).await?;
        let settings: Settings = toml::from_str(&content)?;
        debug!(path = %path.display(), "loaded config file");
        settings
    } else if explicit {
        return Err(ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file not found: {}", path.display()),
        )));
    } else {
        info!(path = %path.display(), "config file not found, using defaults");
        Settings::default()
    };

    settings.apply_env(|key| std::env::var(key).ok())?;
    Ok(settings)
}
