//! Conversation state.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// The committed history of a conversation.
///
/// Messages are append-only. `turn_count` counts participant turns only;
/// seed messages added by the caller are not turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    messages: Vec<Message>,
    roster: Vec<String>,
    turn_count: usize,
    complete: bool,
}

impl ConversationState {
    /// Create an empty state for participants named `roster`.
    #[must_use]
    pub const fn new(roster: Vec<String>) -> Self {
        Self {
            messages: Vec::new(),
            roster,
            turn_count: 0,
            complete: false,
        }
    }

    /// All messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent message.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Participant names in turn order.
    #[must_use]
    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    /// Number of committed participant turns.
    #[must_use]
    pub const fn turn_count(&self) -> usize {
        self.turn_count
    }

    /// Whether the conversation has stopped.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Messages newest first.
    pub fn history_descending(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().rev()
    }

    /// Append a caller message without taking a turn.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Commit one participant turn.
    pub(crate) fn record_turn(&mut self, message: Message) {
        self.messages.push(message);
        self.turn_count += 1;
    }

    pub(crate) const fn set_complete(&mut self, complete: bool) {
        self.complete = complete;
    }

    /// Drop all messages and turns, keeping the roster.
    pub(crate) fn clear(&mut self) {
        self.messages.clear();
        self.turn_count = 0;
        self.complete = false;
    }
}
