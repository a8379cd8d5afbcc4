//! Ordered, append-only message log for one conversation.

use crate::models::Message;

/// Messages of a single conversation in the order they were produced.
///
/// Only appends, a full clear, or a one-off replacement by loaded history
/// ever change the contents. There is no capacity bound.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    messages: Vec<Message>,
}

impl MessageStore {
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Add a message at the end.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove every message. Clearing an empty store is a no-op.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Replace the whole log, used when prior history is loaded.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Owned snapshot of the log; later appends do not affect it.
    pub fn all(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
