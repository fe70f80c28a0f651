//! Conclave - native tool sets, sequential planning and turn-taking agent
//! conversations over hosted language models.
//!
//! The crate is organised around three workflows:
//!
//! - [`planner`]: ask a model to decompose a goal into a [`planner::Plan`]
//!   of [`tool`] invocations, then run the plan locally.
//! - [`conversation`]: drive a strict round-robin exchange between named
//!   [`conversation::Responder`]s until a termination policy is satisfied.
//! - [`agents`]: create hosted agents for the duration of a scope and take
//!   part in conversations through them.
//!
//! Model access goes through [`chat::ChatProvider`], implemented for OpenAI
//! and Azure OpenAI in [`llms`].

pub mod agents;
pub mod chat;
pub mod conversation;
pub mod error;
pub mod llms;
pub mod message;
pub mod planner;
pub mod prelude;
pub mod tool;
pub mod tools;

pub use error::{Error, LlmError, LlmErrorKind, PlanError, ResponderError, Result, ToolError};
