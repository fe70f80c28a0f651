//! Hosted agents as conversation participants.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::conversation::Responder;
use crate::error::LlmError;
use crate::message::Message;

use super::{AgentHandle, AgentService};

/// A [`Responder`] whose turns run on a hosted agent.
#[derive(Clone)]
pub struct RemoteAgentResponder {
    service: Arc<dyn AgentService>,
    handle: AgentHandle,
}

impl RemoteAgentResponder {
    /// Wrap a created agent.
    #[must_use]
    pub fn new(service: Arc<dyn AgentService>, handle: AgentHandle) -> Self {
        Self { service, handle }
    }

    /// The underlying agent.
    #[must_use]
    pub const fn handle(&self) -> &AgentHandle {
        &self.handle
    }
}

impl fmt::Debug for RemoteAgentResponder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAgentResponder")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Responder for RemoteAgentResponder {
    fn name(&self) -> &str {
        &self.handle.name
    }

    async fn respond(&self, history: &[Message]) -> Result<String, LlmError> {
        self.service.run_thread(&self.handle, history).await
    }
}
