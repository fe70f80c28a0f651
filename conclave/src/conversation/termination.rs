//! Termination policies.
//!
//! A policy is a predicate over the conversation state, evaluated after
//! every committed turn. Content-based policies such as
//! [`ApprovalTermination`] say nothing about turn budgets; the hard ceiling
//! lives in the [`MaxIterations`] wrapper.

use tracing::warn;

use super::state::ConversationState;

/// Turn ceiling applied when none is configured.
pub const DEFAULT_MAX_ITERATIONS: usize = 99;

/// Decides whether a conversation stops.
pub trait TerminationPolicy: Send + Sync {
    /// `true` stops the conversation.
    fn evaluate(&self, state: &ConversationState) -> bool;
}

impl TerminationPolicy for Box<dyn TerminationPolicy> {
    fn evaluate(&self, state: &ConversationState) -> bool {
        (**self).evaluate(state)
    }
}

/// Extension methods for policies.
pub trait TerminationPolicyExt: TerminationPolicy + Sized {
    /// Stop after `max` turns at the latest.
    fn with_max_iterations(self, max: usize) -> MaxIterations<Self> {
        MaxIterations::new(self, max)
    }
}

impl<P: TerminationPolicy> TerminationPolicyExt for P {}

/// A policy that never stops on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl TerminationPolicy for Never {
    fn evaluate(&self, _state: &ConversationState) -> bool {
        false
    }
}

/// Stops when the latest message contains a keyword.
///
/// Matching is case-insensitive. When scoped to agents, only messages
/// authored by one of them can stop the conversation. A conversation
/// without messages never stops.
#[derive(Debug, Clone)]
pub struct ApprovalTermination {
    keyword: String,
    agents: Vec<String>,
}

impl ApprovalTermination {
    /// Default approval keyword.
    pub const DEFAULT_KEYWORD: &'static str = "approved";

    /// Create a policy matching [`DEFAULT_KEYWORD`](Self::DEFAULT_KEYWORD).
    #[must_use]
    pub fn new() -> Self {
        Self::with_keyword(Self::DEFAULT_KEYWORD)
    }

    /// Create a policy matching `keyword`.
    #[must_use]
    pub fn with_keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into().to_lowercase(),
            agents: Vec::new(),
        }
    }

    /// Only consider messages authored by `agents`.
    #[must_use]
    pub fn for_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agents = agents.into_iter().map(Into::into).collect();
        self
    }

    /// The lowercase keyword.
    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }
}

impl Default for ApprovalTermination {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminationPolicy for ApprovalTermination {
    fn evaluate(&self, state: &ConversationState) -> bool {
        let Some(last) = state.last_message() else {
            return false;
        };
        if !self.agents.is_empty() && !self.agents.iter().any(|a| last.is_from(a)) {
            return false;
        }
        last.content().to_lowercase().contains(&self.keyword)
    }
}

/// Forces a stop once the turn count reaches a ceiling.
///
/// Wraps any other policy; the inner policy is consulted below the ceiling.
#[derive(Debug, Clone)]
pub struct MaxIterations<P> {
    inner: P,
    max: usize,
}

impl<P: TerminationPolicy> MaxIterations<P> {
    /// Wrap `inner` with a ceiling of `max` turns.
    #[must_use]
    pub const fn new(inner: P, max: usize) -> Self {
        Self { inner, max }
    }

    /// The ceiling.
    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }

    /// Replace the ceiling.
    pub const fn set_max(&mut self, max: usize) {
        self.max = max;
    }

    /// The wrapped policy.
    #[must_use]
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    /// Whether the ceiling alone stops `state`.
    #[must_use]
    pub const fn is_exhausted(&self, state: &ConversationState) -> bool {
        state.turn_count() >= self.max
    }
}

impl<P: TerminationPolicy> TerminationPolicy for MaxIterations<P> {
    fn evaluate(&self, state: &ConversationState) -> bool {
        if self.inner.evaluate(state) {
            return true;
        }
        if self.is_exhausted(state) {
            warn!(
                turns = state.turn_count(),
                max = self.max,
                "Maximum iterations reached, stopping conversation"
            );
            return true;
        }
        false
    }
}
