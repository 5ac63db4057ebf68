//! # chatter-stream
//!
//! Long-lived event-stream sessions for Chatter.
//!
//! A [`Session`] owns one hub listener and turns its messages into events on
//! one client connection, with periodic keepalives in between. The session
//! only sees two narrow capabilities:
//!
//! - **Render** - turn a message into the body of an event
//! - **EventSink** - write bytes to the client and flush them
//!
//! ```rust,ignore
//! use chatter_stream::{Session, SessionConfig};
//!
//! let session = Session::new(&hub, SessionConfig::default());
//! let end = session.run(&renderer, &mut sink, &cancel).await?;
//! ```

pub mod session;
pub mod sse;
pub mod traits;

#[cfg(feature = "http")]
pub mod http;

pub use session::{Session, SessionConfig, SessionEnd, DEFAULT_KEEPALIVE_INTERVAL};
pub use traits::{EventSink, Render, RenderError, StreamError};

#[cfg(feature = "http")]
pub use http::{ChannelSink, EventStream};
