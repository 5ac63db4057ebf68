//! HTML rendering for chat events.

use bytes::Bytes;
use chatter_core::Message;
use chatter_stream::{sse, Render, RenderError};

/// Event name carried by chat message events.
pub const MESSAGE_EVENT: &str = "message";

/// Form fragment returned after a chat post, replacing the submitted form.
///
/// The form posts back to `send_path`.
#[must_use]
pub fn chat_input_html(send_path: &str) -> String {
    format!(
        r#"<form id="chat-input" hx-post="{}" hx-swap="outerHTML">
  <input type="text" name="msg" autocomplete="off" autofocus>
  <button type="submit">Send</button>
</form>"#,
        escape_html(send_path)
    )
}

/// Renders each message as an escaped `<div class="chat-msg">` inside a
/// `message` event.
#[derive(Debug, Clone, Default)]
pub struct ChatRenderer;

impl Render for ChatRenderer {
    fn render(&self, message: &Message) -> Result<Bytes, RenderError> {
        if message.is_empty() {
            return Err(RenderError::new("empty message"));
        }
        let html = format!(r#"<div class="chat-msg">{}</div>"#, escape_html(message.text()));
        Ok(sse::event(Some(MESSAGE_EVENT), &html))
    }
}

/// Escape text for use inside HTML element content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#39;y&#39;&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_chat_input_posts_to_send_path() {
        let form = chat_input_html("/sendChat");
        assert!(form.starts_with(r#"<form id="chat-input" hx-post="/sendChat""#));
        assert!(form.contains(r#"name="msg""#));

        assert!(chat_input_html("/rooms/a&b").contains(r#"hx-post="/rooms/a&amp;b""#));
    }

    #[test]
    fn test_render_chat_message() {
        let body = ChatRenderer
            .render(&Message::new("lobby", "hi <b>all</b>"))
            .unwrap();
        assert_eq!(
            &body[..],
            b"event: message\ndata: <div class=\"chat-msg\">hi &lt;b&gt;all&lt;/b&gt;</div>".as_slice()
        );
    }

    #[test]
    fn test_render_multi_line_message() {
        let body = ChatRenderer
            .render(&Message::new("lobby", "one\ntwo"))
            .unwrap();
        assert_eq!(
            &body[..],
            b"event: message\ndata: <div class=\"chat-msg\">one\ndata: two</div>".as_slice()
        );
    }

    #[test]
    fn test_render_rejects_empty_message() {
        assert!(ChatRenderer.render(&Message::new("lobby", "")).is_err());
    }
}
