use crate::shared::{Id, RemoteError};
use thiserror::Error;

/// Result type for client operations
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Everything that can go wrong when invoking a remote method.
///
/// Transport failures and errors reported by the server are deliberately kept apart, so that
/// callers can tell "the server never saw this" from "the server said no".
#[derive(Debug, Error)]
pub enum ClientError {
    /// The method name was empty.  Nothing was sent.
    #[error("JSON-RPC method name must not be empty")]
    InvalidMethod,

    /// The params could not be serialized to JSON.  Nothing was sent.
    #[error("Failed to serialize params for method '{method}'")]
    Params {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request never completed a round trip with the server
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with an `error` member
    #[error("Server returned an error for request {id}: {error}")]
    Rpc { id: Id<'static>, error: RemoteError },

    /// The server answered, but not with something we can correlate to the request
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The call succeeded but the result doesn't have the shape the caller asked for
    #[error("Failed to decode the result of method '{method}'")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// The error the server reported, if this is an RPC error
    pub fn remote_error(&self) -> Option<&RemoteError> {
        match self {
            ClientError::Rpc { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Failures moving bytes to and from the server.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Non-2xx status whose body isn't JSON, so there's no JSON-RPC error to report instead
    #[error("Server responded with HTTP status {status}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("I/O error on stream transport")]
    Io(#[from] std::io::Error),

    /// The stream ended, or an earlier exchange on it failed part way and left it unusable
    #[error("Stream is closed")]
    Closed,

    #[error("Invalid message framing: {0}")]
    Framing(String),

    #[error("Timed out after {0:?} waiting for a response")]
    Timeout(std::time::Duration),
}

impl TransportError {
    /// True if the server could not be reached at all (connection refused and friends)
    pub fn is_connect(&self) -> bool {
        use std::io::ErrorKind;

        match self {
            TransportError::Http(e) => e.is_connect(),
            TransportError::Io(e) => matches!(
                e.kind(),
                ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::NotConnected
            ),
            _ => false,
        }
    }

    /// True if the server was reached but didn't answer in time
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_timeout(),
            TransportError::Timeout(_) => true,
            _ => false,
        }
    }
}

/// The server sent something back, but it isn't a usable response to our request.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Response is not a valid JSON-RPC response: {body}")]
    Malformed {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response id {actual} does not match request id {expected}")]
    IdMismatch {
        expected: Id<'static>,
        actual: Id<'static>,
    },

    #[error("Response to request {id} has neither a result nor an error")]
    MissingResult { id: Id<'static> },

    #[error("Response to request {id} has both a result and an error")]
    ResultAndError { id: Id<'static> },
}
