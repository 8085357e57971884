//! Companion server bridging JSON-RPC control clients to a browser
//! extension over a single reconnecting WebSocket.

pub mod bridge;
pub mod cli;
pub mod error;
pub mod http;
pub mod logging;
pub mod router;
pub mod sessions;
