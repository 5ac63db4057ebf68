//! Event-stream wire format.
//!
//! Every event is its content followed by a blank line. Keepalives are a
//! comment line, which clients ignore.

use bytes::{BufMut, Bytes, BytesMut};

/// Content type of an event-stream response.
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Terminates every event.
pub const RECORD_TERMINATOR: &[u8] = b"\n\n";

/// Body of the keepalive event.
pub const KEEPALIVE: &[u8] = b": keepalive";

/// Build the body of an event: an optional `event:` line followed by one
/// `data:` line per line of `data`.
///
/// The result carries no record terminator.
#[must_use]
pub fn event(name: Option<&str>, data: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(data.len() + 32);

    if let Some(name) = name {
        buf.put_slice(b"event: ");
        buf.put_slice(strip_newlines(name).as_bytes());
        buf.put_u8(b'\n');
    }

    let mut first = true;
    for line in data.split('\n') {
        if !first {
            buf.put_u8(b'\n');
        }
        first = false;
        buf.put_slice(b"data: ");
        buf.put_slice(line.strip_suffix('\r').unwrap_or(line).as_bytes());
    }

    buf.freeze()
}

fn strip_newlines(s: &str) -> &str {
    s.split(['\r', '\n']).next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_event() {
        assert_eq!(&event(None, "hello")[..], b"data: hello");
    }

    #[test]
    fn test_named_multi_line_event() {
        let body = event(Some("message"), "<p>one</p>\r\n<p>two</p>");
        assert_eq!(&body[..], b"event: message\ndata: <p>one</p>\ndata: <p>two</p>");
    }

    #[test]
    fn test_event_name_cannot_inject_lines() {
        let body = event(Some("message\ndata: injected"), "x");
        assert_eq!(&body[..], b"event: message\ndata: x");
    }

    #[test]
    fn test_empty_data() {
        assert_eq!(&event(None, "")[..], b"data: ");
    }
}
