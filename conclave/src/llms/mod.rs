//! Completion service backends.
//!
//! - [`openai`] - OpenAI and Azure OpenAI (chat and text completion)
//! - [`mock`] - Scripted in-process provider for tests and offline runs

pub mod mock;
pub mod openai;

pub use mock::MockChatProvider;
pub use openai::{ApiFlavor, OpenAI, OpenAIConfig};
