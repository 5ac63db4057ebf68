//! HTTP response body integration.
//!
//! [`channel`] splits a response into a [`ChannelSink`], which a session
//! writes to, and an [`EventStream`], which becomes the response body. When
//! the client goes away the server drops the body, and the body cancels the
//! session's token on its way out.

use crate::sse::CONTENT_TYPE;
use crate::traits::{EventSink, StreamError};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Create a connected sink and response body.
///
/// `buffer` is the number of flushed events that may wait for the client
/// before [`ChannelSink::flush`] waits. Dropping the returned stream cancels
/// `cancel`.
#[must_use]
pub fn channel(buffer: usize, cancel: CancellationToken) -> (ChannelSink, EventStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let sink = ChannelSink {
        tx,
        pending: BytesMut::with_capacity(1024),
    };
    let stream = EventStream {
        rx,
        _disconnect: cancel.drop_guard(),
    };
    (sink, stream)
}

/// Sink half: buffers writes and hands them to the body on flush.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    pending: BytesMut,
}

impl ChannelSink {
    /// Whether the body has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, StreamError> {
        if self.tx.is_closed() {
            return Err(StreamError::ConnectionClosed);
        }
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), StreamError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = self.pending.split().freeze();
        self.tx
            .send(chunk)
            .await
            .map_err(|_| StreamError::ConnectionClosed)
    }
}

/// Body half: yields flushed events in order.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Bytes>,
    _disconnect: DropGuard,
}

impl Stream for EventStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}

impl IntoResponse for EventStream {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, CONTENT_TYPE),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            ],
            Body::from_stream(self),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_flush_delivers_one_chunk() {
        let cancel = CancellationToken::new();
        let (mut sink, mut stream) = channel(4, cancel.clone());

        sink.write_all(b"data: hi").await.unwrap();
        sink.write_all(b"\n\n").await.unwrap();
        sink.flush().await.unwrap();

        let chunk = stream.next().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"data: hi\n\n");
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropping_body_cancels_and_closes() {
        let cancel = CancellationToken::new();
        let (mut sink, stream) = channel(4, cancel.clone());

        drop(stream);
        assert!(cancel.is_cancelled());
        assert!(sink.is_closed());
        assert!(matches!(
            sink.write(b"late").await,
            Err(StreamError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_body_ends_when_sink_is_dropped() {
        let (sink, mut stream) = channel(1, CancellationToken::new());
        drop(sink);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_response_headers() {
        let (_sink, stream) = channel(1, CancellationToken::new());
        let response = stream.into_response();
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
