//! Scoped agent lifetimes.

use std::future::Future;
use std::mem;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::Result;

use super::{AgentDefinition, AgentHandle, AgentService};

/// Creates agents for the duration of an async block.
///
/// Every agent created by [`AgentScope::run`] is deleted before it returns,
/// whether the body succeeds, fails, or creation stops part-way. If the
/// future is dropped early, deletion is handed to the runtime instead.
#[derive(Debug, Clone, Copy)]
pub struct AgentScope;

impl AgentScope {
    /// Create one agent per definition, run `body` with their handles, then
    /// delete them.
    ///
    /// Deletion failures are logged and do not replace the body's outcome.
    ///
    /// # Errors
    ///
    /// Returns the first creation error, or whatever `body` returns.
    pub async fn run<F, Fut, T>(
        service: &Arc<dyn AgentService>,
        definitions: Vec<AgentDefinition>,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(Vec<AgentHandle>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut guard = CleanupGuard::new(Arc::clone(service));

        for definition in &definitions {
            let handle = service.create_agent(definition).await;
            match handle {
                Ok(handle) => {
                    info!(agent = %handle.name, id = %handle.id, "Created agent");
                    guard.handles.push(handle);
                }
                Err(err) => {
                    warn!(agent = %definition.name, error = %err, "Agent creation failed");
                    guard.release().await;
                    return Err(err);
                }
            }
        }

        let outcome = body(guard.handles.clone()).await;
        guard.release().await;
        outcome
    }
}

/// Deletes tracked agents, on `release` or on drop.
struct CleanupGuard {
    service: Arc<dyn AgentService>,
    handles: Vec<AgentHandle>,
}

impl CleanupGuard {
    fn new(service: Arc<dyn AgentService>) -> Self {
        Self {
            service,
            handles: Vec::new(),
        }
    }

    async fn release(&mut self) {
        let handles = mem::take(&mut self.handles);
        delete_all(self.service.as_ref(), &handles).await;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        let handles = mem::take(&mut self.handles);
        let service = Arc::clone(&self.service);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(count = handles.len(), "Scope dropped early, deleting agents in background");
                runtime.spawn(async move { delete_all(service.as_ref(), &handles).await });
            }
            Err(_) => {
                let ids: Vec<&str> = handles.iter().map(|h| h.id.as_str()).collect();
                warn!(?ids, "Scope dropped outside a runtime, agents were not deleted");
            }
        }
    }
}

async fn delete_all(service: &dyn AgentService, handles: &[AgentHandle]) {
    let results = join_all(handles.iter().map(|h| service.delete_agent(&h.id))).await;
    for (handle, result) in handles.iter().zip(results) {
        match result {
            Ok(()) => debug!(agent = %handle.name, id = %handle.id, "Deleted agent"),
            Err(err) => {
                warn!(agent = %handle.name, id = %handle.id, error = %err, "Failed to delete agent");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::agents::Connection;
    use crate::error::{Error, LlmError};
    use crate::message::Message;

    /// Records lifecycle calls; fails creation of agents named "broken".
    #[derive(Default)]
    struct RecordingService {
        created: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
        fail_delete: bool,
    }

    #[async_trait]
    impl AgentService for RecordingService {
        async fn get_connection(&self, name: &str) -> Result<Connection> {
            Ok(Connection {
                id: format!("conn/{name}"),
                name: name.to_owned(),
            })
        }

        async fn create_agent(&self, definition: &AgentDefinition) -> Result<AgentHandle> {
            if definition.name == "broken" {
                return Err(Error::agent("quota exceeded"));
            }
            let mut created = self.created.lock().unwrap();
            let id = format!("asst_{}", created.len());
            created.push(id.clone());
            Ok(AgentHandle {
                id,
                name: definition.name.clone(),
            })
        }

        async fn delete_agent(&self, agent_id: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(agent_id.to_owned());
            if self.fail_delete {
                return Err(Error::agent("delete failed"));
            }
            Ok(())
        }

        async fn run_thread(
            &self,
            agent: &AgentHandle,
            _history: &[Message],
        ) -> std::result::Result<String, LlmError> {
            Ok(format!("hello from {}", agent.name))
        }
    }

    fn defs(names: &[&str]) -> Vec<AgentDefinition> {
        names
            .iter()
            .map(|n| AgentDefinition::new(*n, "instructions"))
            .collect()
    }

    fn deleted(service: &RecordingService) -> Vec<String> {
        service.deleted.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn deletes_after_success() {
        let recording = Arc::new(RecordingService::default());
        let service: Arc<dyn AgentService> = Arc::<RecordingService>::clone(&recording);

        let names = AgentScope::run(&service, defs(&["A", "B"]), |agents| async move {
            Ok(agents.into_iter().map(|a| a.name).collect::<Vec<_>>())
        })
        .await
        .unwrap();

        assert_eq!(names, ["A", "B"]);
        assert_eq!(deleted(&recording), ["asst_0", "asst_1"]);
    }

    #[tokio::test]
    async fn deletes_after_body_error() {
        let recording = Arc::new(RecordingService::default());
        let service: Arc<dyn AgentService> = Arc::<RecordingService>::clone(&recording);

        let err = AgentScope::run(&service, defs(&["A"]), |_| async {
            Err::<(), _>(Error::agent("conversation failed"))
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains("conversation failed"));
        assert_eq!(deleted(&recording), ["asst_0"]);
    }

    #[tokio::test]
    async fn partial_creation_is_rolled_back() {
        let recording = Arc::new(RecordingService::default());
        let service: Arc<dyn AgentService> = Arc::<RecordingService>::clone(&recording);

        let err = AgentScope::run(&service, defs(&["A", "broken", "C"]), |_| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("quota"));
        assert_eq!(deleted(&recording), ["asst_0"]);
        assert_eq!(recording.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_failure_does_not_mask_outcome() {
        let recording = Arc::new(RecordingService {
            fail_delete: true,
            ..RecordingService::default()
        });
        let service: Arc<dyn AgentService> = Arc::<RecordingService>::clone(&recording);

        let value = AgentScope::run(&service, defs(&["A", "B"]), |_| async { Ok(42) })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(deleted(&recording).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_scope_deletes_in_background() {
        let recording = Arc::new(RecordingService::default());
        let service: Arc<dyn AgentService> = Arc::<RecordingService>::clone(&recording);

        let scope = AgentScope::run(&service, defs(&["A"]), |_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        assert!(tokio::time::timeout(Duration::from_secs(1), scope).await.is_err());

        tokio::task::yield_now().await;
        assert_eq!(deleted(&recording), ["asst_0"]);
    }
}
