//! In-memory message history for the official API

use moka::sync::Cache;
use serde::{Deserialize, Serialize};

const DEFAULT_CAPACITY: u64 = 10_000;

/// One turn kept for rebuilding prompts from a parent message id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoredMessage {
    pub id: String,
    pub role: String,
    pub text: String,
    pub parent_message_id: Option<String>,
}

/// Bounded cache of official API messages keyed by message id
#[derive(Clone)]
pub struct ConversationStore {
    messages: Cache<String, StoredMessage>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            messages: Cache::new(capacity),
        }
    }

    pub fn get(&self, id: &str) -> Option<StoredMessage> {
        self.messages.get(id)
    }

    pub fn insert(&self, message: StoredMessage) {
        self.messages.insert(message.id.clone(), message);
    }

    /// Walk parent links starting at `id`, newest first
    pub fn ancestors(&self, id: &str) -> impl Iterator<Item = StoredMessage> + '_ {
        let mut next = Some(id.to_string());
        std::iter::from_fn(move || {
            let message = self.get(next.as_deref()?)?;
            next = message.parent_message_id.clone();
            Some(message)
        })
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
