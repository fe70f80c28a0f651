//! OpenAI API client implementation.
//!
//! This module provides a client for the OpenAI and Azure OpenAI APIs,
//! supporting chat completions and legacy text completions.

mod chat;
mod client;
mod config;
mod types;

pub use client::OpenAI;
pub use config::{ApiFlavor, OpenAIConfig};
