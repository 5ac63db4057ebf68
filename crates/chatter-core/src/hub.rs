//! Broadcast hub.
//!
//! The hub owns the registry of listeners for one broadcast channel and fans
//! each published message out to all of them. Delivery never blocks the
//! publisher: every mailbox holds at most one undelivered message, and a
//! message that finds the mailbox full is dropped for that listener and
//! reported back in a [`SkipReport`].

use crate::listener::{Listener, ListenerId, MailboxSender};
use crate::message::Message;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

/// Name used by [`Hub::new`].
pub const DEFAULT_HUB_NAME: &str = "default";

/// Why a message was not delivered to a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The listener has not drained its previous message yet.
    #[error("mailbox full, message dropped")]
    Full,

    /// The listener's receiving end is gone.
    #[error("mailbox closed")]
    Closed,
}

impl<T> From<TrySendError<T>> for DeliveryError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => Self::Full,
            TrySendError::Closed(_) => Self::Closed,
        }
    }
}

/// Listeners skipped by a single [`Hub::send`] call.
///
/// Empty when every registered listener received the message.
pub type SkipReport = HashMap<ListenerId, DeliveryError>;

/// The broadcast hub for one channel.
#[derive(Debug)]
pub struct Hub {
    name: String,
    /// Mailbox senders indexed by listener id.
    listeners: RwLock<HashMap<ListenerId, MailboxSender>>,
    messages_sent: AtomicU64,
    deliveries_skipped: AtomicU64,
}

impl Hub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::with_name(DEFAULT_HUB_NAME)
    }

    /// Create an empty hub with a name, used as the room of the messages it
    /// builds and in log output.
    #[must_use]
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listeners: RwLock::new(HashMap::new()),
            messages_sent: AtomicU64::new(0),
            deliveries_skipped: AtomicU64::new(0),
        }
    }

    /// Get the hub name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a new listener with an empty mailbox.
    ///
    /// The caller is responsible for passing the listener's id to
    /// [`Hub::remove_listener`] when done. [`Hub::subscribe`] does that
    /// automatically.
    pub fn add_listener(&self) -> Listener {
        let (listener, tx) = Listener::new();
        let id = listener.id();

        let count = {
            let mut listeners = self.listeners.write();
            listeners.insert(id, tx);
            listeners.len()
        };

        debug!(hub = %self.name, listener = %id, listeners = count, "Listener added");
        listener
    }

    /// Remove a listener.
    ///
    /// Returns `true` if the listener was registered. Removing an unknown id
    /// is a no-op.
    pub fn remove_listener(&self, id: &ListenerId) -> bool {
        let (removed, count) = {
            let mut listeners = self.listeners.write();
            let removed = listeners.remove(id).is_some();
            (removed, listeners.len())
        };

        if removed {
            debug!(hub = %self.name, listener = %id, listeners = count, "Listener removed");
        }
        removed
    }

    /// Register a listener that is removed again when the returned guard is
    /// dropped.
    #[must_use]
    pub fn subscribe(self: &Arc<Self>) -> Registration {
        Registration {
            listener: self.add_listener(),
            hub: Arc::clone(self),
        }
    }

    /// Publish text to every registered listener.
    pub fn send(&self, text: impl Into<Arc<str>>) -> SkipReport {
        self.send_message(Arc::new(Message::new(self.name.as_str(), text)))
    }

    /// Publish a prepared message to every registered listener.
    ///
    /// Never waits on a listener. Listeners whose mailbox is still occupied
    /// keep their buffered message and miss this one; they are listed in the
    /// returned report. Nothing is retried.
    pub fn send_message(&self, message: Arc<Message>) -> SkipReport {
        let mut skipped = SkipReport::new();

        let delivered = {
            let listeners = self.listeners.read();
            for (id, tx) in listeners.iter() {
                if let Err(err) = tx.try_send(Arc::clone(&message)) {
                    skipped.insert(*id, err.into());
                }
            }
            listeners.len() - skipped.len()
        };

        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        if !skipped.is_empty() {
            self.deliveries_skipped
                .fetch_add(skipped.len() as u64, Ordering::Relaxed);
        }

        trace!(
            hub = %self.name,
            message = message.id,
            delivered,
            skipped = skipped.len(),
            "Message sent"
        );
        skipped
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Whether a listener is registered.
    #[must_use]
    pub fn contains(&self, id: &ListenerId) -> bool {
        self.listeners.read().contains_key(id)
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            listeners: self.len(),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            deliveries_skipped: self.deliveries_skipped.load(Ordering::Relaxed),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Currently registered listeners.
    pub listeners: usize,
    /// Messages published since creation.
    pub messages_sent: u64,
    /// Per-listener deliveries skipped since creation.
    pub deliveries_skipped: u64,
}

/// A listener that stays registered for as long as this guard lives.
#[derive(Debug)]
pub struct Registration {
    hub: Arc<Hub>,
    listener: Listener,
}

impl Registration {
    /// Get the listener id.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.listener.id()
    }

    /// Get the hub this listener is registered with.
    #[must_use]
    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Wait for the next message.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.listener.recv().await
    }

    /// Mutable access to the listener.
    pub fn listener_mut(&mut self) -> &mut Listener {
        &mut self.listener
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.hub.remove_listener(&self.listener.id());
    }
}
