//! Azure AI Agents client.
//!
//! Speaks the project-scoped Agents REST API: assistants are created and
//! deleted per scope, and every turn runs on a fresh thread seeded with the
//! conversation so far.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, info_span, warn, Instrument};
use url::Url;

use crate::error::{Error, LlmError, Result};
use crate::message::{Message, Role};

use super::{AgentDefinition, AgentHandle, AgentService, Connection};

const PROVIDER: &str = "azure-agents";

/// The address of an Azure AI project.
///
/// Parsed from a connection string of the form
/// `<host>;<subscription id>;<resource group>;<project name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConnection {
    /// Regional API host, e.g. `eastus.api.azureml.ms`.
    pub host: String,
    /// Azure subscription id.
    pub subscription_id: String,
    /// Resource group name.
    pub resource_group: String,
    /// Project (workspace) name.
    pub project_name: String,
}

impl ProjectConnection {
    /// Root URL for agent operations in this project.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!(
            "https://{}/agents/v1.0/subscriptions/{}/resourceGroups/{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
            self.host, self.subscription_id, self.resource_group, self.project_name
        )
    }
}

impl FromStr for ProjectConnection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split(';').map(str::trim).collect();
        let [host, subscription_id, resource_group, project_name] = parts.as_slice() else {
            return Err(Error::config(
                "project connection string must have four ';'-separated parts",
            ));
        };
        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::config("project connection string has an empty part"));
        }

        let host = host
            .trim_start_matches("https://")
            .trim_end_matches('/');
        Url::parse(&format!("https://{host}"))
            .map_err(|e| Error::config(format!("invalid project host '{host}': {e}")))?;

        Ok(Self {
            host: host.to_owned(),
            subscription_id: (*subscription_id).to_owned(),
            resource_group: (*resource_group).to_owned(),
            project_name: (*project_name).to_owned(),
        })
    }
}

/// Configuration for [`AzureAgentsClient`].
#[derive(Debug, Clone)]
pub struct AgentsConfig {
    /// Target project.
    pub connection: ProjectConnection,
    /// Bearer token for the project.
    pub token: String,
    /// Default model deployment for created agents.
    pub model: String,
    /// REST API version.
    pub api_version: String,
    /// Delay between run status polls.
    pub poll_interval: Duration,
    /// Upper bound on a single thread run.
    pub run_timeout: Duration,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Replaces the project base URL derived from the connection.
    pub endpoint: Option<String>,
}

impl AgentsConfig {
    /// Default REST API version.
    pub const DEFAULT_API_VERSION: &'static str = "2024-12-01-preview";

    /// Create a configuration.
    #[must_use]
    pub fn new(
        connection: ProjectConnection,
        token: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            token: token.into(),
            model: model.into(),
            api_version: Self::DEFAULT_API_VERSION.to_owned(),
            poll_interval: Duration::from_millis(500),
            run_timeout: Duration::from_secs(300),
            timeout_secs: Some(60),
            endpoint: None,
        }
    }

    /// Load from `AZURE_AI_AGENT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Fails if the connection string, model deployment or token is missing,
    /// or the connection string is malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::config(format!("{key} is not set")))
        };

        let connection: ProjectConnection =
            require("AZURE_AI_AGENT_PROJECT_CONNECTION_STRING")?.parse()?;
        let model = require("AZURE_AI_AGENT_MODEL_DEPLOYMENT_NAME")?;
        let token = require("AZURE_AI_AGENT_TOKEN")?;

        let mut config = Self::new(connection, token, model);
        if let Some(version) = lookup("AZURE_AI_AGENT_API_VERSION").filter(|v| !v.is_empty()) {
            config.api_version = version;
        }
        Ok(config)
    }

    /// Set the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Set the run status poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Send requests to `endpoint` instead of the project URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into().trim_end_matches('/').to_owned());
        self
    }

    /// Set the thread run timeout.
    #[must_use]
    pub const fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct CreateAssistantRequest<'a> {
    model: &'a str,
    name: &'a str,
    instructions: &'a str,
    #[serde(skip_serializing_if = "<[Value]>::is_empty")]
    tools: &'a [Value],
}

#[derive(Debug, Serialize)]
struct CreateThreadRunRequest<'a> {
    assistant_id: &'a str,
    thread: ThreadSeed,
}

#[derive(Debug, Serialize)]
struct ThreadSeed {
    messages: Vec<ThreadMessageSeed>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct ThreadMessageSeed {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionResponse {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct ThreadRun {
    id: String,
    thread_id: String,
    status: String,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Agent service backed by an Azure AI project.
#[derive(Debug, Clone)]
pub struct AzureAgentsClient {
    config: Arc<AgentsConfig>,
    client: Client,
}

impl AzureAgentsClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Fails if the token is empty or the HTTP client cannot be built.
    pub fn new(config: AgentsConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(LlmError::auth(PROVIDER, "access token is required").into());
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

    /// Create a client from `AZURE_AI_AGENT_*` environment variables.
    ///
    /// # Errors
    ///
    /// See [`AgentsConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(AgentsConfig::from_env()?)
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &AgentsConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        let sep = if path.contains('?') { '&' } else { '?' };
        let base = match &self.config.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => self.config.connection.base_url(),
        };
        format!("{base}/{path}{sep}api-version={}", self.config.api_version)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.config.token)
    }

    async fn send<R: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> std::result::Result<R, LlmError> {
        let response = request
            .send()
            .await
            .map_err(|e| LlmError::from(e).or_provider(PROVIDER))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::from(e).or_provider(PROVIDER))?;
        if !status.is_success() {
            return Err(parse_error(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            LlmError::response_format("agent service JSON", e.to_string()).or_provider(PROVIDER)
        })
    }

    async fn delete(&self, path: &str) -> std::result::Result<(), LlmError> {
        self.send::<Value>(self.request(Method::DELETE, path))
            .await
            .map(drop)
    }

    async fn poll_run(&self, mut run: ThreadRun) -> std::result::Result<ThreadRun, LlmError> {
        let deadline = Instant::now() + self.config.run_timeout;
        loop {
            match run.status.as_str() {
                "completed" => return Ok(run),
                "failed" | "cancelled" | "expired" => {
                    let (code, message) = run
                        .last_error
                        .map(|e| (e.code, e.message))
                        .unwrap_or_default();
                    let message = message.unwrap_or_else(|| format!("run {}", run.status));
                    return Err(match code {
                        Some(code) => LlmError::provider_code(PROVIDER, code, message),
                        None => LlmError::provider(PROVIDER, message),
                    });
                }
                "requires_action" => {
                    return Err(LlmError::not_supported("client-side tool calls in agent runs")
                        .or_provider(PROVIDER));
                }
                status => debug!(run = %run.id, status, "Waiting for run"),
            }

            if Instant::now() >= deadline {
                return Err(LlmError::timeout(self.config.run_timeout).or_provider(PROVIDER));
            }
            sleep(self.config.poll_interval).await;

            let path = format!("threads/{}/runs/{}", run.thread_id, run.id);
            run = self.send(self.request(Method::GET, &path)).await?;
        }
    }

    async fn latest_reply(&self, thread_id: &str) -> std::result::Result<String, LlmError> {
        let path = format!("threads/{thread_id}/messages?order=desc&limit=1");
        let list: MessageList = self.send(self.request(Method::GET, &path)).await?;
        list.data
            .into_iter()
            .find(|m| m.role == "assistant")
            .map(ThreadMessage::text)
            .ok_or_else(|| {
                LlmError::response_format("an assistant message", "none").or_provider(PROVIDER)
            })
    }
}

/// Owns a remote thread for the length of one turn.
///
/// Released explicitly on the normal path. If the turn future is dropped
/// first (timeout or cancellation), the still-running run is cancelled and
/// the thread deleted in the background.
struct ThreadGuard {
    client: AzureAgentsClient,
    thread_id: String,
    active_run: Option<String>,
    armed: bool,
}

impl ThreadGuard {
    fn new(client: &AzureAgentsClient, run: &ThreadRun) -> Self {
        Self {
            client: client.clone(),
            thread_id: run.thread_id.clone(),
            active_run: Some(run.id.clone()),
            armed: true,
        }
    }

    /// The run reached a terminal state; only the thread is left.
    fn run_finished(&mut self) {
        self.active_run = None;
    }

    async fn release(mut self) {
        self.armed = false;
        discard_thread(&self.client, &self.thread_id, self.active_run.as_deref()).await;
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let client = self.client.clone();
        let thread_id = std::mem::take(&mut self.thread_id);
        let active_run = self.active_run.take();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(thread = %thread_id, "Turn dropped early, discarding thread in background");
                runtime.spawn(async move {
                    discard_thread(&client, &thread_id, active_run.as_deref()).await;
                });
            }
            Err(_) => warn!(thread = %thread_id, "Turn dropped outside a runtime, thread was not deleted"),
        }
    }
}

async fn discard_thread(client: &AzureAgentsClient, thread_id: &str, active_run: Option<&str>) {
    if let Some(run_id) = active_run {
        let path = format!("threads/{thread_id}/runs/{run_id}/cancel");
        match client.send::<Value>(client.request(Method::POST, &path)).await {
            Ok(_) => debug!(thread = %thread_id, run = %run_id, "Cancelled run"),
            Err(err) => debug!(thread = %thread_id, run = %run_id, error = %err, "Run cancel failed"),
        }
    }
    match client.delete(&format!("threads/{thread_id}")).await {
        Ok(()) => debug!(thread = %thread_id, "Deleted thread"),
        Err(err) => warn!(thread = %thread_id, error = %err, "Failed to delete thread"),
    }
}

impl ThreadMessage {
    fn text(self) -> String {
        self.content
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.value),
                ContentPart::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// The agent sees its own turns as assistant messages and everyone else's
/// as user messages prefixed with the author's name.
fn thread_messages(agent: &str, history: &[Message]) -> Vec<ThreadMessageSeed> {
    history
        .iter()
        .map(|msg| {
            if msg.is_from(agent) {
                ThreadMessageSeed {
                    role: "assistant",
                    content: msg.content().to_owned(),
                }
            } else {
                let content = match (msg.role(), msg.name()) {
                    (Role::User, None) => msg.content().to_owned(),
                    (_, Some(name)) => format!("{name}: {}", msg.content()),
                    (role, None) => format!("{role}: {}", msg.content()),
                };
                ThreadMessageSeed {
                    role: "user",
                    content,
                }
            }
        })
        .collect()
}

fn parse_error(status: u16, body: &str) -> LlmError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        let ErrorBody { code, message } = envelope.error;
        return match status {
            401 | 403 => LlmError::auth(PROVIDER, message),
            429 => LlmError::rate_limited(PROVIDER),
            400 => LlmError::invalid_request(message).or_provider(PROVIDER),
            _ => LlmError::provider_code(PROVIDER, code.unwrap_or_else(|| status.to_string()), message),
        };
    }
    LlmError::http_status(status, body.to_owned()).or_provider(PROVIDER)
}

#[async_trait]
impl AgentService for AzureAgentsClient {
    async fn get_connection(&self, name: &str) -> Result<Connection> {
        let path = format!("connections/{name}");
        let found: ConnectionResponse = self.send(self.request(Method::GET, &path)).await?;
        Ok(Connection {
            id: found.id,
            name: found.name,
        })
    }

    async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentHandle> {
        let body = CreateAssistantRequest {
            model: definition.model.as_deref().unwrap_or(&self.config.model),
            name: &definition.name,
            instructions: &definition.instructions,
            tools: &definition.tools,
        };
        let mut request = self.request(Method::POST, "assistants").json(&body);
        if !definition.tools.is_empty() {
            // Grounding tools are preview features
            request = request.header("x-ms-enable-preview", "true");
        }
        let created: IdResponse = self.send(request).await?;
        Ok(AgentHandle {
            id: created.id,
            name: definition.name.clone(),
        })
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<()> {
        self.delete(&format!("assistants/{agent_id}")).await?;
        Ok(())
    }

    async fn run_thread(
        &self,
        agent: &AgentHandle,
        history: &[Message],
    ) -> std::result::Result<String, LlmError> {
        let span = info_span!("thread_run", agent = %agent.name, messages = history.len());
        async {
            let body = CreateThreadRunRequest {
                assistant_id: &agent.id,
                thread: ThreadSeed {
                    messages: thread_messages(&agent.name, history),
                },
            };
            let run: ThreadRun = self
                .send(self.request(Method::POST, "threads/runs").json(&body))
                .await?;
            let thread_id = run.thread_id.clone();
            let mut guard = ThreadGuard::new(self, &run);

            let reply = match self.poll_run(run).await {
                Ok(_) => {
                    guard.run_finished();
                    self.latest_reply(&thread_id).await
                }
                Err(err) => Err(err),
            };

            guard.release().await;
            reply
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::LlmErrorKind;

    const CONN: &str = "eastus.api.azureml.ms;sub-1;rg-1;proj-1";

    fn client() -> AzureAgentsClient {
        AzureAgentsClient::new(AgentsConfig::new(CONN.parse().unwrap(), "token", "gpt-4o")).unwrap()
    }

    mod connection {
        use super::*;

        #[test]
        fn parses_four_parts() {
            let conn: ProjectConnection = CONN.parse().unwrap();
            assert_eq!(conn.host, "eastus.api.azureml.ms");
            assert_eq!(conn.project_name, "proj-1");
            assert_eq!(
                conn.base_url(),
                "https://eastus.api.azureml.ms/agents/v1.0/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.MachineLearningServices/workspaces/proj-1"
            );
        }

        #[test]
        fn rejects_malformed() {
            assert!("host;sub;rg".parse::<ProjectConnection>().is_err());
            assert!("host;;rg;proj".parse::<ProjectConnection>().is_err());
            assert!("bad host;sub;rg;proj".parse::<ProjectConnection>().is_err());
        }
    }

    mod config {
        use super::*;

        fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
            let map: HashMap<String, String> = vars
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect();
            move |key| map.get(key).cloned()
        }

        #[test]
        fn from_lookup_requires_all() {
            let err = AgentsConfig::from_lookup(lookup(&[(
                "AZURE_AI_AGENT_PROJECT_CONNECTION_STRING",
                CONN,
            )]))
            .unwrap_err();
            assert!(err.to_string().contains("AZURE_AI_AGENT_MODEL_DEPLOYMENT_NAME"));
        }

        #[test]
        fn from_lookup_reads_values() {
            let config = AgentsConfig::from_lookup(lookup(&[
                ("AZURE_AI_AGENT_PROJECT_CONNECTION_STRING", CONN),
                ("AZURE_AI_AGENT_MODEL_DEPLOYMENT_NAME", "gpt-4o-mini"),
                ("AZURE_AI_AGENT_TOKEN", "t"),
                ("AZURE_AI_AGENT_API_VERSION", "2025-01-01"),
            ]))
            .unwrap();
            assert_eq!(config.model, "gpt-4o-mini");
            assert_eq!(config.api_version, "2025-01-01");
        }
    }

    mod wire {
        use super::*;

        #[test]
        fn urls_carry_api_version() {
            let c = client();
            assert!(c.url("assistants").ends_with("/assistants?api-version=2024-12-01-preview"));
            assert!(
                c.url("threads/t/messages?order=desc&limit=1")
                    .ends_with("/threads/t/messages?order=desc&limit=1&api-version=2024-12-01-preview")
            );
        }

        #[test]
        fn empty_token_rejected() {
            let config = AgentsConfig::new(CONN.parse().unwrap(), "", "gpt-4o");
            assert!(AzureAgentsClient::new(config).is_err());
        }

        #[test]
        fn thread_messages_map_roles() {
            let history = vec![
                Message::user("Find me a job"),
                Message::from_participant("Planner", "Try data science"),
                Message::from_participant("Finder", "Here are three listings"),
            ];
            let seeded = thread_messages("Finder", &history);
            assert_eq!(
                seeded,
                vec![
                    ThreadMessageSeed {
                        role: "user",
                        content: "Find me a job".into()
                    },
                    ThreadMessageSeed {
                        role: "user",
                        content: "Planner: Try data science".into()
                    },
                    ThreadMessageSeed {
                        role: "assistant",
                        content: "Here are three listings".into()
                    },
                ]
            );
        }

        #[test]
        fn message_text_joins_text_parts() {
            let list: MessageList = serde_json::from_str(
                r#"{"data":[{"role":"assistant","content":[
                    {"type":"text","text":{"value":"first","annotations":[]}},
                    {"type":"image_file","image_file":{"file_id":"f"}},
                    {"type":"text","text":{"value":"second","annotations":[]}}
                ]}]}"#,
            )
            .unwrap();
            let text = list.data.into_iter().next().unwrap().text();
            assert_eq!(text, "first\nsecond");
        }

        #[test]
        fn assistant_body_omits_empty_tools() {
            let body = CreateAssistantRequest {
                model: "gpt-4o",
                name: "A",
                instructions: "be helpful",
                tools: &[],
            };
            let json = serde_json::to_value(&body).unwrap();
            assert!(json.get("tools").is_none());
            assert_eq!(json["model"], "gpt-4o");
        }

        #[test]
        fn error_kinds() {
            let body = r#"{"error":{"code":"Unauthorized","message":"bad token"}}"#;
            assert_eq!(parse_error(401, body).kind, LlmErrorKind::Auth);
            assert_eq!(parse_error(429, body).kind, LlmErrorKind::RateLimited);
            assert_eq!(parse_error(500, body).kind, LlmErrorKind::Provider);
            assert_eq!(parse_error(502, "gateway").kind, LlmErrorKind::HttpStatus);
        }
    }

    /// Turns against an in-process stand-in for the project endpoint.
    mod turns {
        use std::net::SocketAddr;
        use std::sync::Mutex;

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::{TcpListener, TcpStream};

        use super::*;
        use crate::agents::BingGrounding;

        #[derive(Debug, Clone)]
        struct Recorded {
            method: String,
            path: String,
            headers: String,
        }

        struct FakeProject {
            addr: SocketAddr,
            requests: Arc<Mutex<Vec<Recorded>>>,
        }

        impl FakeProject {
            async fn start(run_status: &'static str) -> Self {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let addr = listener.local_addr().unwrap();
                let requests = Arc::new(Mutex::new(Vec::new()));
                let log = Arc::clone(&requests);
                tokio::spawn(async move {
                    while let Ok((mut socket, _)) = listener.accept().await {
                        let log = Arc::clone(&log);
                        tokio::spawn(async move {
                            let Some(request) = read_request(&mut socket).await else {
                                return;
                            };
                            let body = reply_for(&request, run_status);
                            log.lock().unwrap().push(request);
                            let response = format!(
                                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                                body.len()
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        });
                    }
                });
                Self { addr, requests }
            }

            fn client(&self) -> AzureAgentsClient {
                let config = AgentsConfig::new(CONN.parse().unwrap(), "token", "gpt-4o")
                    .with_endpoint(format!("http://{}", self.addr))
                    .with_poll_interval(Duration::from_millis(10));
                AzureAgentsClient::new(config).unwrap()
            }

            fn calls(&self) -> Vec<String> {
                self.requests
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|r| format!("{} {}", r.method, r.path))
                    .collect()
            }

            fn last(&self) -> Recorded {
                self.requests.lock().unwrap().last().cloned().unwrap()
            }

            async fn wait_for(&self, call: &str) -> bool {
                for _ in 0..200 {
                    if self.calls().iter().any(|c| c == call) {
                        return true;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                false
            }
        }

        async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
            let mut buf = Vec::new();
            let mut chunk = [0_u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.ok()?;
                if n == 0 {
                    return None;
                }
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).into_owned();
                let Some(end) = text.find("\r\n\r\n") else {
                    continue;
                };
                let (request_line, headers) = text[..end].split_once("\r\n").unwrap_or((&text[..end], ""));
                let headers = headers.to_ascii_lowercase();
                let length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() < end + 4 + length {
                    continue;
                }
                let mut parts = request_line.split_whitespace();
                let method = parts.next()?.to_owned();
                let path = parts.next()?.split('?').next()?.to_owned();
                return Some(Recorded {
                    method,
                    path,
                    headers,
                });
            }
        }

        fn reply_for(request: &Recorded, run_status: &str) -> String {
            let run = |status: &str| {
                format!(r#"{{"id":"run-1","thread_id":"thread-1","status":"{status}"}}"#)
            };
            match (request.method.as_str(), request.path.as_str()) {
                ("POST", "/threads/runs") | ("GET", "/threads/thread-1/runs/run-1") => run(run_status),
                ("POST", "/threads/thread-1/runs/run-1/cancel") => run("cancelling"),
                ("GET", "/threads/thread-1/messages") => {
                    r#"{"data":[{"role":"assistant","content":[{"type":"text","text":{"value":"Three openings in Munich"}}]}]}"#.to_owned()
                }
                ("POST", "/assistants") => r#"{"id":"asst-1"}"#.to_owned(),
                _ => r#"{"id":"gone","deleted":true}"#.to_owned(),
            }
        }

        fn finder() -> AgentHandle {
            AgentHandle {
                id: "asst-1".into(),
                name: "Finder".into(),
            }
        }

        #[tokio::test]
        async fn completed_run_returns_reply_and_deletes_thread() {
            let project = FakeProject::start("completed").await;
            let client = project.client();

            let reply = client
                .run_thread(&finder(), &[Message::user("Find me a job")])
                .await
                .unwrap();

            assert_eq!(reply, "Three openings in Munich");
            assert_eq!(
                project.calls(),
                [
                    "POST /threads/runs",
                    "GET /threads/thread-1/messages",
                    "DELETE /threads/thread-1",
                ]
            );
        }

        #[tokio::test]
        async fn dropped_turn_cancels_run_and_deletes_thread() {
            let project = FakeProject::start("in_progress").await;
            let client = project.client();

            let history = [Message::user("Find me a job")];
            let turn = tokio::time::timeout(
                Duration::from_millis(100),
                client.run_thread(&finder(), &history),
            )
            .await;
            assert!(turn.is_err());

            assert!(project.wait_for("DELETE /threads/thread-1").await);
            let calls = project.calls();
            let cancel = calls
                .iter()
                .position(|c| c == "POST /threads/thread-1/runs/run-1/cancel")
                .unwrap();
            let delete = calls.iter().position(|c| c == "DELETE /threads/thread-1").unwrap();
            assert!(cancel < delete);
        }

        #[tokio::test]
        async fn grounded_agents_enable_preview() {
            let project = FakeProject::start("completed").await;
            let client = project.client();

            let plain = AgentDefinition::new("Planner", "plan careers");
            client.create_agent(&plain).await.unwrap();
            assert!(!project.last().headers.contains("x-ms-enable-preview"));

            let grounded = AgentDefinition::new("Finder", "search jobs")
                .with_tool(BingGrounding::new("conn-1").into());
            let handle = client.create_agent(&grounded).await.unwrap();
            assert_eq!(handle.id, "asst-1");
            assert!(project.last().headers.contains("x-ms-enable-preview: true"));
        }
    }
}
