//! Message types exchanged between callers, responders and completion services.
//!
//! A [`Message`] is immutable once created: its role, author and content are
//! only readable through accessors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message providing instructions.
    System,
    /// User message.
    User,
    /// Assistant (model or agent) message.
    Assistant,
}

impl Role {
    /// Get the string representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    content: String,
}

impl Message {
    /// Create a message with an explicit role.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            name: None,
            content: content.into(),
        }
    }

    /// Create a new system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant message authored by a named participant.
    #[must_use]
    pub fn from_participant(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::assistant(content).with_name(name)
    }

    /// Set the author name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The message role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// The author name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The text content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Whether this message was authored by `name`.
    #[must_use]
    pub fn is_from(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }
}

/// Renders as `# <role> - <name>: '<content>'`, using `*` when unnamed.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "# {} - {}: '{}'",
            self.role,
            self.name.as_deref().unwrap_or("*"),
            self.content
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_role() {
        assert_eq!(Message::system("s").role(), Role::System);
        assert_eq!(Message::user("u").role(), Role::User);
        assert_eq!(Message::assistant("a").role(), Role::Assistant);
    }

    #[test]
    fn from_participant_sets_name() {
        let msg = Message::from_participant("CareerPlannerAgent", "Data engineer");
        assert_eq!(msg.role(), Role::Assistant);
        assert_eq!(msg.name(), Some("CareerPlannerAgent"));
        assert!(msg.is_from("CareerPlannerAgent"));
        assert!(!msg.is_from("JobSearchAgent"));
    }

    #[test]
    fn display_uses_star_for_unnamed() {
        assert_eq!(Message::user("hi").to_string(), "# user - *: 'hi'");
        assert_eq!(
            Message::from_participant("Bot", "ok").to_string(),
            "# assistant - Bot: 'ok'"
        );
    }

    #[test]
    fn serde_omits_missing_name() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));

        let parsed: Message =
            serde_json::from_str(r#"{"role":"assistant","name":"Bot","content":"ok"}"#).unwrap();
        assert_eq!(parsed, Message::from_participant("Bot", "ok"));
    }
}
