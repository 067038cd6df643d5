//! Defines the transport layer for the JSON-RPC client.
//!
//! Transports move already-serialized JSON-RPC messages to a server and bring back the raw
//! response.  They know nothing about ids or envelopes; correlation happens in the client.

mod http;
mod stream;

pub use http::HttpTransport;
pub use stream::{Framing, StdioTransport, StreamTransport, TcpTransport};

use crate::error::TransportError;

/// A way of delivering JSON-RPC messages to a server.
///
/// Exactly one exchange is in flight per call.  Implementations that share a single connection
/// must serialize exchanges themselves.
#[async_trait::async_trait]
pub trait JsonRpcTransport: Send + Sync {
    /// Deliver a serialized request and return the raw body of the server's response
    async fn request(&self, message: String) -> Result<String, TransportError>;

    /// Deliver a serialized notification.  The server sends nothing back.
    async fn notify(&self, message: String) -> Result<(), TransportError>;
}

#[async_trait::async_trait]
impl<T> JsonRpcTransport for Box<T>
where
    T: JsonRpcTransport + ?Sized,
{
    async fn request(&self, message: String) -> Result<String, TransportError> {
        (**self).request(message).await
    }

    async fn notify(&self, message: String) -> Result<(), TransportError> {
        (**self).notify(message).await
    }
}

#[async_trait::async_trait]
impl<T> JsonRpcTransport for std::sync::Arc<T>
where
    T: JsonRpcTransport + ?Sized,
{
    async fn request(&self, message: String) -> Result<String, TransportError> {
        (**self).request(message).await
    }

    async fn notify(&self, message: String) -> Result<(), TransportError> {
        (**self).notify(message).await
    }
}
