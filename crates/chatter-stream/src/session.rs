//! Streaming session.
//!
//! A session bridges one client connection to a [`Hub`]. It registers a
//! listener, then loops over three wake sources until the connection ends:
//!
//! - a message arrives in the listener's mailbox: render it, write it, flush
//! - the keepalive timer fires: write a comment event, flush
//! - the cancellation token fires: stop without writing anything else
//!
//! The listener is owned through a [`Registration`], so it leaves the hub on
//! every exit path, including write failures and panics.

use crate::sse::{KEEPALIVE, RECORD_TERMINATOR};
use crate::traits::{EventSink, Render, StreamError};
use chatter_core::{Hub, ListenerId, Registration};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default keepalive interval.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time between keepalive events.
    pub keepalive_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connection's cancellation token fired.
    Cancelled,
    /// The hub dropped this session's listener.
    Detached,
}

/// One client's streaming session.
#[derive(Debug)]
pub struct Session {
    registration: Registration,
    config: SessionConfig,
}

impl Session {
    /// Register a new session with a hub.
    #[must_use]
    pub fn new(hub: &Arc<Hub>, config: SessionConfig) -> Self {
        Self::from_registration(hub.subscribe(), config)
    }

    /// Build a session around a listener that is already registered.
    #[must_use]
    pub fn from_registration(registration: Registration, config: SessionConfig) -> Self {
        Self {
            registration,
            config,
        }
    }

    /// Id of the listener this session owns.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.registration.id()
    }

    /// Run the session until the connection is cancelled, the hub drops the
    /// listener, or a write fails.
    ///
    /// Messages that fail to render are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns the write or flush error that ended the session.
    pub async fn run<R, S>(
        mut self,
        renderer: &R,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, StreamError>
    where
        R: Render + ?Sized,
        S: EventSink + ?Sized,
    {
        let id = self.id();
        let hub = Arc::clone(self.registration.hub());
        debug!(hub = %hub.name(), listener = %id, "Session started");

        let result = self.event_loop(renderer, sink, cancel).await;

        // Leave the hub before reporting the outcome.
        drop(self);

        match &result {
            Ok(end) => debug!(hub = %hub.name(), listener = %id, ?end, "Session ended"),
            Err(e) => debug!(hub = %hub.name(), listener = %id, error = %e, "Session failed"),
        }
        result
    }

    async fn event_loop<R, S>(
        &mut self,
        renderer: &R,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, StreamError>
    where
        R: Render + ?Sized,
        S: EventSink + ?Sized,
    {
        let period = self.config.keepalive_interval;
        let mut keepalive = time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Unbiased so that no wake source can starve the others.
        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(SessionEnd::Cancelled),

                message = self.registration.recv() => {
                    let Some(message) = message else {
                        return Ok(SessionEnd::Detached);
                    };

                    let body = match renderer.render(&message) {
                        Ok(body) => body,
                        Err(e) => {
                            warn!(listener = %self.id(), message = message.id, error = %e, "Skipping message");
                            continue;
                        }
                    };

                    if !emit(sink, &body, cancel).await? {
                        return Ok(SessionEnd::Cancelled);
                    }
                    trace!(listener = %self.id(), message = message.id, "Message written");
                }

                _ = keepalive.tick() => {
                    if !emit(sink, KEEPALIVE, cancel).await? {
                        return Ok(SessionEnd::Cancelled);
                    }
                    trace!(listener = %self.id(), "Keepalive written");
                }
            }
        }
    }
}

/// Write one event and flush it.
///
/// Returns `Ok(false)` when cancellation won the race; nothing is written
/// once the token has fired.
async fn emit<S>(sink: &mut S, body: &[u8], cancel: &CancellationToken) -> Result<bool, StreamError>
where
    S: EventSink + ?Sized,
{
    if cancel.is_cancelled() {
        return Ok(false);
    }

    let write = async {
        sink.write_all(body).await?;
        sink.write_all(RECORD_TERMINATOR).await?;
        sink.flush().await
    };

    tokio::select! {
        result = write => result.map(|()| true),
        () = cancel.cancelled() => Ok(false),
    }
}
