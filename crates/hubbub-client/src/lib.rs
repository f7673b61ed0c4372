//! hubbub-client: typed chat client over WebSocket.
//!
//! Connects to a hubbub server, then splits into a send half (one method
//! per client verb) and a receive half yielding decoded messages.

mod client;

pub use client::{ChatClient, ChatReceiver, ChatSender};
