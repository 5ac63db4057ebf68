//! Capabilities a session needs from its surroundings.
//!
//! A session does not know how messages become markup or where the bytes end
//! up. It is handed a [`Render`] and an [`EventSink`], both of which are easy
//! to replace in tests.

use async_trait::async_trait;
use bytes::Bytes;
use chatter_core::Message;
use thiserror::Error;

/// Stream errors. Any of these ends the session that hit it.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The client side of the connection is gone.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The sink accepted no bytes.
    #[error("Write accepted zero bytes")]
    WriteZero,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Failure to render a single message.
///
/// Only the affected event is skipped; the session keeps running.
#[derive(Debug, Error)]
#[error("Render failed: {0}")]
pub struct RenderError(pub String);

impl RenderError {
    /// Create a render error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Turns a message into the body of one event.
///
/// The returned bytes must not carry the record terminator; the session
/// appends it.
pub trait Render: Send + Sync {
    /// Render one message.
    fn render(&self, message: &Message) -> Result<Bytes, RenderError>;
}

impl<F> Render for F
where
    F: Fn(&Message) -> Result<Bytes, RenderError> + Send + Sync,
{
    fn render(&self, message: &Message) -> Result<Bytes, RenderError> {
        self(message)
    }
}

/// Where a session writes its events.
#[async_trait]
pub trait EventSink: Send {
    /// Write some bytes, returning how many were accepted.
    async fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError>;

    /// Push everything written so far to the client.
    async fn flush(&mut self) -> Result<(), StreamError>;

    /// Write the whole buffer.
    async fn write_all(&mut self, mut buf: &[u8]) -> Result<(), StreamError> {
        while !buf.is_empty() {
            match self.write(buf).await? {
                0 => return Err(StreamError::WriteZero),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `chunk` bytes per write.
    struct Trickle {
        chunk: usize,
        out: Vec<u8>,
    }

    #[async_trait]
    impl EventSink for Trickle {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
            let n = buf.len().min(self.chunk);
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        async fn flush(&mut self) -> Result<(), StreamError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_write_all_handles_short_writes() {
        let mut sink = Trickle {
            chunk: 3,
            out: Vec::new(),
        };
        sink.write_all(b"data: hello\n\n").await.unwrap();
        assert_eq!(sink.out, b"data: hello\n\n");
    }

    #[tokio::test]
    async fn test_write_all_rejects_zero_writes() {
        let mut sink = Trickle {
            chunk: 0,
            out: Vec::new(),
        };
        assert!(matches!(
            sink.write_all(b"x").await,
            Err(StreamError::WriteZero)
        ));
    }

    #[test]
    fn test_closure_renderer() {
        let render = |m: &Message| -> Result<Bytes, RenderError> {
            Ok(Bytes::from(format!("data: {}", m.text())))
        };
        let out = render.render(&Message::new("lobby", "hi")).unwrap();
        assert_eq!(&out[..], b"data: hi");
    }
}
