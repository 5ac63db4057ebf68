//! # chatter-core
//!
//! Broadcast hub for the Chatter live chat server.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Hub** - Listener registry and non-blocking fan-out
//! - **Listener** - One subscriber: a unique id plus a single-slot mailbox
//! - **Rooms** - Independent hubs addressed by name
//! - **Message** - The published chat message
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  send   ┌─────────────┐ try_send ┌─────────────┐
//! │  Publisher  │────────▶│     Hub     │─────────▶│  Mailbox    │──▶ session
//! └─────────────┘         └─────────────┘          └─────────────┘
//!                                │ skip report
//!                                ▼
//!                         listeners whose
//!                         mailbox was full
//! ```
//!
//! Each mailbox holds at most one undelivered message. A message arriving at
//! a full mailbox is dropped for that listener, so a stalled subscriber never
//! slows down the publisher or anyone else.

pub mod hub;
pub mod listener;
pub mod message;
pub mod rooms;

pub use hub::{DeliveryError, Hub, HubStats, Registration, SkipReport};
pub use listener::{Listener, ListenerId, MAILBOX_CAPACITY};
pub use message::Message;
pub use rooms::{Rooms, RoomsConfig, RoomsError, RoomsStats, DEFAULT_ROOM};
