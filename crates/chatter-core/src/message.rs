//! Chat message type shared between publishers and listeners.
//!
//! A message is published once and handed to every listener as an
//! `Arc<Message>`, so fan-out never copies the text.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique message identifier.
pub type MessageId = u64;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> MessageId {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    (unix_nanos() as u64).wrapping_add(counter)
}

/// A published chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier.
    pub id: MessageId,
    /// Room the message was published to.
    pub room: String,
    /// Message text, exactly as the publisher supplied it.
    pub text: Arc<str>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl Message {
    /// Create a new message for a room.
    #[must_use]
    pub fn new(room: impl Into<String>, text: impl Into<Arc<str>>) -> Self {
        Self {
            id: generate_message_id(),
            room: room.into(),
            text: text.into(),
            timestamp: (unix_nanos() / 1_000_000) as u64,
        }
    }

    /// Get the message text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Whether the text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::new("lobby", "hello");
        assert_eq!(msg.room, "lobby");
        assert_eq!(msg.text(), "hello");
        assert_eq!(msg.len(), 5);
        assert!(!msg.is_empty());
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_message_display() {
        let msg = Message::new("lobby", String::from("hi there"));
        assert_eq!(msg.to_string(), "hi there");
    }

    #[test]
    fn test_unique_message_ids() {
        let id1 = generate_message_id();
        let id2 = generate_message_id();
        assert_ne!(id1, id2);
    }
}
