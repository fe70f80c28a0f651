//! The round-robin conversation loop.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{Error, LlmError, ResponderError, Result};
use crate::message::Message;

use super::responder::Responder;
use super::state::ConversationState;
use super::termination::{DEFAULT_MAX_ITERATIONS, MaxIterations, TerminationPolicy};

/// Outcome of one [`ConversationLoop::advance`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// The committed reply.
    pub message: Message,
    /// Whether the conversation stopped after this turn.
    pub complete: bool,
}

/// Drives turn-taking between named responders.
///
/// Participants speak in roster order, wrapping around. After every
/// committed turn the termination policy is evaluated; a turn ceiling
/// (99 unless configured) always applies on top of it.
///
/// A turn is committed only after its responder has replied. A failed,
/// timed-out or cancelled call leaves the state exactly as it was.
pub struct ConversationLoop {
    roster: Vec<Arc<dyn Responder>>,
    policy: MaxIterations<Box<dyn TerminationPolicy>>,
    state: ConversationState,
    turn_timeout: Option<Duration>,
}

impl ConversationLoop {
    /// Create a loop over `roster`, stopping when `policy` says so.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Agent`] if the roster is empty or two participants
    /// share a name.
    pub fn new(
        roster: Vec<Arc<dyn Responder>>,
        policy: impl TerminationPolicy + 'static,
    ) -> Result<Self> {
        if roster.is_empty() {
            return Err(Error::agent("conversation needs at least one participant"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = roster.iter().find(|r| !seen.insert(r.name().to_owned())) {
            return Err(Error::agent(format!(
                "duplicate participant name '{}'",
                dup.name()
            )));
        }

        let names = roster.iter().map(|r| r.name().to_owned()).collect();
        let policy: Box<dyn TerminationPolicy> = Box::new(policy);
        Ok(Self {
            roster,
            policy: MaxIterations::new(policy, DEFAULT_MAX_ITERATIONS),
            state: ConversationState::new(names),
            turn_timeout: None,
        })
    }

    /// Stop after `max` turns regardless of the policy.
    #[must_use]
    pub fn with_maximum_iterations(mut self, max: usize) -> Self {
        self.policy.set_max(max);
        self
    }

    /// Bound each responder call by `timeout`.
    #[must_use]
    pub const fn with_turn_timeout(mut self, timeout: Duration) -> Self {
        self.turn_timeout = Some(timeout);
        self
    }

    /// The turn ceiling.
    #[must_use]
    pub const fn maximum_iterations(&self) -> usize {
        self.policy.max()
    }

    /// The committed state.
    #[must_use]
    pub const fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Whether the conversation has stopped.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    /// Append a caller message (usually the seed) without taking a turn.
    pub fn add_message(&mut self, message: Message) {
        debug!(role = %message.role(), "Adding message to conversation");
        self.state.add_message(message);
    }

    /// The participant whose turn is next.
    #[must_use]
    pub fn next_participant(&self) -> &str {
        self.roster[self.state.turn_count() % self.roster.len()].name()
    }

    /// Run one turn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Agent`] if the conversation is already complete or
    /// the turn ceiling is already reached, and [`Error::Responder`] naming
    /// the participant if its call fails or times out. No turn is committed
    /// in any of these cases.
    pub async fn advance(&mut self) -> Result<Turn> {
        if self.state.is_complete() || self.stop_at_ceiling() {
            return Err(Error::agent("conversation is complete"));
        }

        let responder = Arc::clone(&self.roster[self.state.turn_count() % self.roster.len()]);
        let name = responder.name().to_owned();
        debug!(
            participant = %name,
            turn = self.state.turn_count() + 1,
            "Requesting reply"
        );

        let call = responder.respond(self.state.messages());
        let reply = match self.turn_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or_else(|_| Err(LlmError::timeout(limit))),
            None => call.await,
        };

        let content = reply.map_err(|source| {
            warn!(participant = %name, error = %source, "Responder failed");
            ResponderError::new(&name, source)
        })?;

        let message = Message::from_participant(&name, content);
        self.state.record_turn(message.clone());
        let complete = self.policy.evaluate(&self.state);
        self.state.set_complete(complete);

        if complete {
            info!(turns = self.state.turn_count(), last = %name, "Conversation complete");
        }
        Ok(Turn { message, complete })
    }

    /// Advance until the conversation completes.
    ///
    /// # Errors
    ///
    /// Stops at the first failing turn and returns its error; turns
    /// committed before it stay in the state.
    pub async fn run_to_completion(&mut self) -> Result<&ConversationState> {
        let span = info_span!(
            "conversation",
            participants = %self.state.roster().join(", "),
            max_iterations = self.policy.max(),
        );

        async {
            self.stop_at_ceiling();
            while !self.state.is_complete() {
                self.advance().await?;
            }
            Ok::<_, Error>(())
        }
        .instrument(span)
        .await?;

        Ok(&self.state)
    }

    /// Mark the conversation complete if the ceiling leaves no turn to take.
    fn stop_at_ceiling(&mut self) -> bool {
        if !self.policy.is_exhausted(&self.state) {
            return false;
        }
        warn!(
            turns = self.state.turn_count(),
            max = self.policy.max(),
            "Maximum iterations reached, stopping conversation"
        );
        self.state.set_complete(true);
        true
    }

    /// Clear the history so the loop can start over with the same roster.
    pub fn reset(&mut self) {
        debug!("Resetting conversation");
        self.state.clear();
    }
}

impl fmt::Debug for ConversationLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationLoop")
            .field("roster", &self.state.roster())
            .field("maximum_iterations", &self.policy.max())
            .field("turn_timeout", &self.turn_timeout)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
