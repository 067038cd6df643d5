//! A very minimal JSON-RPC client, with just enough functionality to drive a language server
//! through its `initialize` handshake (and any other single request/response exchange).
//!
//! `jsonrpsee` has a full-featured client, but it is built around long-lived connections,
//! batching and subscriptions, none of which are needed to poke at a language server listening
//! on an HTTP port.  This implementation does reuse the JSON-RPC types from `jsonrpsee-types`.
mod client;
mod config;
mod error;
pub mod lsp;
mod shared;
mod transport;

pub use client::*;
pub use config::*;
pub use error::*;
pub use shared::*;
pub use transport::*;
