//! Unified error types for conclave.
//!
//! This module provides the error hierarchy covering:
//! - LLM provider errors (authentication, rate limiting, timeouts, etc.)
//! - Tool registry and tool execution errors
//! - Plan creation and execution errors
//! - Conversation responder errors

use std::fmt;

/// Result type alias for conclave operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for conclave.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// LLM provider error.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Tool registry or execution error.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Planner or plan execution error.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// A conversation participant failed to produce a reply.
    #[error("Responder error: {0}")]
    Responder(#[from] ResponderError),

    /// Agent or conversation runtime error.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Invalid or missing configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create an agent error with a message.
    #[must_use]
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Create a configuration error with a message.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Error type for LLM provider operations.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LlmError {
    /// The error kind.
    pub kind: LlmErrorKind,
    /// The provider name (e.g., "openai", "azure-openai").
    pub provider: Option<String>,
    /// Additional error message.
    pub message: String,
    /// Optional error code from the provider.
    pub code: Option<String>,
}

/// Categories of LLM errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum LlmErrorKind {
    /// Authentication or authorization failure.
    Auth,
    /// Rate limit exceeded.
    RateLimited,
    /// Context length exceeded.
    ContextExceeded,
    /// Invalid request parameters.
    InvalidRequest,
    /// Response format error.
    ResponseFormat,
    /// Network or connection error.
    Network,
    /// The call did not complete within its deadline.
    Timeout,
    /// HTTP status error.
    HttpStatus,
    /// Provider-specific error.
    Provider,
    /// Internal error.
    Internal,
    /// Feature not supported.
    NotSupported,
}

impl LlmError {
    const fn with_kind(kind: LlmErrorKind, message: String) -> Self {
        Self {
            kind,
            provider: None,
            message,
            code: None,
        }
    }

    /// Create an authentication error.
    #[must_use]
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::with_kind(LlmErrorKind::Auth, message.into())
        }
    }

    /// Create a rate limit error.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::with_kind(
                LlmErrorKind::RateLimited,
                "Rate limit exceeded. Please retry after some time.".into(),
            )
        }
    }

    /// Create a context exceeded error.
    #[must_use]
    pub fn context_exceeded(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::ContextExceeded, message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::InvalidRequest, message.into())
    }

    /// Create a response format error.
    #[must_use]
    pub fn response_format(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::with_kind(
            LlmErrorKind::ResponseFormat,
            format!("Expected {}, got {}", expected.into(), got.into()),
        )
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Network, message.into())
    }

    /// Create a timeout error for a call that exceeded `timeout`.
    #[must_use]
    pub fn timeout(timeout: std::time::Duration) -> Self {
        Self::with_kind(
            LlmErrorKind::Timeout,
            format!("Request timed out after {}ms", timeout.as_millis()),
        )
    }

    /// Create an HTTP status error.
    #[must_use]
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            code: Some(status.to_string()),
            ..Self::with_kind(
                LlmErrorKind::HttpStatus,
                format!("HTTP {status}: {}", body.into()),
            )
        }
    }

    /// Create a provider-specific error.
    #[must_use]
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: Some(provider.into()),
            ..Self::with_kind(LlmErrorKind::Provider, message.into())
        }
    }

    /// Create a provider error with an error code.
    #[must_use]
    pub fn provider_code(
        provider: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: Some(provider.into()),
            code: Some(code.into()),
            ..Self::with_kind(LlmErrorKind::Provider, message.into())
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_kind(LlmErrorKind::Internal, message.into())
    }

    /// Create a not supported error.
    #[must_use]
    pub fn not_supported(feature: impl Into<String>) -> Self {
        Self::with_kind(
            LlmErrorKind::NotSupported,
            format!("Feature not supported: {}", feature.into()),
        )
    }

    /// Attach a provider name if none is set yet.
    #[must_use]
    pub fn or_provider(mut self, provider: impl Into<String>) -> Self {
        if self.provider.is_none() {
            self.provider = Some(provider.into());
        }
        self
    }

    /// Check if this is a retryable error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            LlmErrorKind::RateLimited | LlmErrorKind::Network | LlmErrorKind::Timeout
        )
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(provider) = &self.provider {
            write!(f, "[{provider}] ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::with_kind(LlmErrorKind::Timeout, "Request timed out".into())
        } else if err.is_connect() {
            Self::network(format!("Connection failed: {err}"))
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Error type for tool registration and invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// A tool with the same name is already registered.
    #[error("Tool '{0}' is already registered")]
    DuplicateName(String),

    /// No tool is registered under the requested name.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// A required parameter is missing or not usable by the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The divisor parsed to zero.
    #[error("Division by zero")]
    DivisionByZero,

    /// Error raised by the tool body itself.
    #[error("Execution error: {0}")]
    Execution(String),
}

impl ToolError {
    /// Create a duplicate name error.
    #[must_use]
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateName(name.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create an invalid arguments error.
    #[must_use]
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Create an execution error.
    #[must_use]
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}

/// Error type for plan creation and execution.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum PlanError {
    /// The planner selected no step for the goal.
    #[error("No plan could be created for goal: {goal}")]
    Empty {
        /// The goal the planner was asked to satisfy.
        goal: String,
    },

    /// The planner's output could not be read as a plan.
    #[error("Failed to parse plan: {0}")]
    Parse(String),

    /// A step's tool invocation failed.
    #[error("Step {index} ({tool}) failed: {source}")]
    Step {
        /// Zero-based index of the failing step.
        index: usize,
        /// Tool reference named by the step.
        tool: String,
        /// The tool error, passed through unmodified.
        #[source]
        source: ToolError,
    },
}

impl PlanError {
    /// Create an empty plan error.
    #[must_use]
    pub fn empty(goal: impl Into<String>) -> Self {
        Self::Empty { goal: goal.into() }
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

/// A conversation participant's remote call failed.
///
/// Names the failing participant alongside the underlying remote error.
#[derive(Debug, Clone, thiserror::Error)]
#[error("participant '{participant}' failed: {source}")]
pub struct ResponderError {
    /// Name of the participant whose turn failed.
    pub participant: String,
    /// The remote error.
    #[source]
    pub source: LlmError,
}

impl ResponderError {
    /// Create a responder error.
    #[must_use]
    pub fn new(participant: impl Into<String>, source: LlmError) -> Self {
        Self {
            participant: participant.into(),
            source,
        }
    }

    /// Check whether the remote call timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.source.kind == LlmErrorKind::Timeout
    }
}
