// SPDX-License-Identifier: GPL-3.0-only

//! Append-only, session-scoped chat log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    System,
    Viewer,
    Streamer,
}

/// One chat line; never mutated once appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub author: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ChatKind,
}

/// Ordered message log
///
/// Snapshots share the backing vector; an append after a snapshot was taken
/// copies it, so snapshots never observe later messages.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    messages: Arc<Vec<ChatMessage>>,
    last_id: u64,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append with the next id (ids start at 1)
    pub fn append(&mut self, author: impl Into<String>, body: impl Into<String>, kind: ChatKind) -> ChatMessage {
        self.last_id += 1;
        let message = ChatMessage {
            id: self.last_id,
            author: author.into(),
            body: body.into(),
            timestamp: Utc::now(),
            kind,
        };
        Arc::make_mut(&mut self.messages).push(message.clone());
        message
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            messages: Arc::clone(&self.messages),
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message; ids keep increasing
    pub fn clear(&mut self) {
        self.messages = Arc::new(Vec::new());
    }
}

/// Immutable view of the log at one instant; iterate it as often as needed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSnapshot {
    messages: Arc<Vec<ChatMessage>>,
}

impl ChatSnapshot {
    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }

    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<'a> IntoIterator for &'a ChatSnapshot {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
