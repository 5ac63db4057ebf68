//! Listener identity and mailbox.
//!
//! A listener is one registered recipient of broadcast messages. The hub keeps
//! the sending half of its mailbox; the listener value handed back to the
//! caller owns the receiving half.

use crate::message::Message;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use uuid::Uuid;

/// Number of undelivered messages a mailbox can hold.
pub const MAILBOX_CAPACITY: usize = 1;

/// Process-unique listener identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Generate a fresh, time-ordered identifier.
    ///
    /// # Panics
    ///
    /// Panics if the platform entropy source is unavailable. There is no safe
    /// way to hand out an identity in that state.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Sending half of a mailbox, held by the hub.
pub(crate) type MailboxSender = mpsc::Sender<Arc<Message>>;

/// A registered listener: its id plus the receiving end of its mailbox.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    mailbox: mpsc::Receiver<Arc<Message>>,
}

impl Listener {
    /// Create a listener with a fresh id and an empty mailbox.
    ///
    /// Returns the listener and the sender the hub stores for it.
    pub(crate) fn new() -> (Self, MailboxSender) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let listener = Self {
            id: ListenerId::generate(),
            mailbox: rx,
        };
        (listener, tx)
    }

    /// Get the listener id.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next message.
    ///
    /// Returns `None` once the hub has dropped this listener and the mailbox
    /// is drained.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.mailbox.recv().await
    }

    /// Take the buffered message without waiting, if any.
    ///
    /// # Errors
    ///
    /// Returns `TryRecvError::Empty` when nothing is buffered and
    /// `TryRecvError::Disconnected` when the hub has dropped this listener.
    pub fn try_recv(&mut self) -> Result<Arc<Message>, TryRecvError> {
        self.mailbox.try_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_ids_are_unique() {
        let a = ListenerId::generate();
        let b = ListenerId::generate();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }

    #[tokio::test]
    async fn test_mailbox_holds_one_message() {
        let (mut listener, tx) = Listener::new();

        tx.try_send(Arc::new(Message::new("lobby", "a"))).unwrap();
        assert!(tx.try_send(Arc::new(Message::new("lobby", "b"))).is_err());

        let msg = listener.recv().await.unwrap();
        assert_eq!(msg.text(), "a");
        assert!(matches!(listener.try_recv(), Err(TryRecvError::Empty)));

        drop(tx);
        assert!(listener.recv().await.is_none());
    }
}
