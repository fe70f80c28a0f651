//! Multi-participant conversations.
//!
//! This module provides:
//! - [`Responder`]: a named participant backed by a remote service
//! - [`TerminationPolicy`]: the stop predicate, plus the [`MaxIterations`] ceiling
//! - [`ConversationLoop`]: strict round-robin turn-taking over a roster
//!
//! # Example
//!
//! ```rust,ignore
//! use conclave::prelude::*;
//!
//! let roster: Vec<Arc<dyn Responder>> = vec![planner, job_finder];
//! let policy = ApprovalTermination::new().for_agents(["JobSearchAgent"]);
//! let mut chat = ConversationLoop::new(roster, policy)?.with_maximum_iterations(20);
//!
//! chat.add_message(Message::user("What careers suit a data analyst?"));
//! let state = chat.run_to_completion().await?;
//! ```

mod responder;
mod runner;
mod state;
mod termination;

pub use responder::{ChatResponder, Responder, ScriptedResponder};
pub use runner::{ConversationLoop, Turn};
pub use state::ConversationState;
pub use termination::{
    ApprovalTermination, DEFAULT_MAX_ITERATIONS, MaxIterations, Never, TerminationPolicy,
    TerminationPolicyExt,
};
