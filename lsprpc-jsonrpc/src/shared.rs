use crate::error::ProtocolError;
use jsonrpsee_types as jsonrpc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Re-use some of the heavy lifting done in jsonrpsee, pretending as if these are our own types
pub use jsonrpc::{ErrorCode, ErrorObject, ErrorObjectOwned, Id, TwoPointZero};

/// A method invocation, as written to the wire.
///
/// Created once per call and never modified; it only lives long enough to be serialized and to
/// remember which id the response must carry.
#[derive(Clone, Debug, Serialize)]
pub struct RequestEnvelope {
    pub jsonrpc: TwoPointZero,
    pub id: Id<'static>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestEnvelope {
    pub fn new(id: Id<'static>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: TwoPointZero,
            id,
            method: method.into(),
            params,
        }
    }
}

/// A notification, which is fire-and-forget: no id, and the server must not answer it.
#[derive(Clone, Debug, Serialize)]
pub struct NotificationEnvelope {
    pub jsonrpc: TwoPointZero,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl NotificationEnvelope {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: TwoPointZero,
            method: method.into(),
            params,
        }
    }
}

/// A decoded response: the id it claims to answer, and either the result or the server's error.
#[derive(Debug)]
pub struct ResponseEnvelope {
    pub id: Id<'static>,
    pub outcome: Result<Value, RemoteError>,
}

impl ResponseEnvelope {
    /// Parse a raw response body.
    ///
    /// Servers in the wild are sloppy about the "exactly one of `result` and `error`" rule: the
    /// JSON-RPC 1.0 style sends `"error": null` next to a result, and `"result": null` next to an
    /// error.  A `null` on the losing side is treated as absent.  A `null` result with no error is
    /// a perfectly good successful response whose value happens to be `null`.
    pub fn parse(body: &str) -> Result<Self, ProtocolError> {
        #[derive(Deserialize)]
        struct RawResponse<'a> {
            #[serde(borrow, default)]
            id: Option<Id<'a>>,
            #[serde(default, deserialize_with = "present")]
            result: Option<Value>,
            #[serde(default)]
            error: Option<Value>,
        }

        let raw: RawResponse = serde_json::from_str(body).map_err(|source| {
            ProtocolError::Malformed {
                body: body.to_string(),
                source,
            }
        })?;

        let id = raw.id.map(Id::into_owned).unwrap_or(Id::Null);

        let outcome = match (raw.result, raw.error) {
            (None | Some(Value::Null), Some(error)) => Err(RemoteError::from_value(error)),
            (Some(_), Some(_)) => return Err(ProtocolError::ResultAndError { id }),
            (Some(result), None) => Ok(result),
            (None, None) => return Err(ProtocolError::MissingResult { id }),
        };

        Ok(Self { id, outcome })
    }
}

/// Deserializes a field so that a literal `null` is `Some(Value::Null)`, leaving `None` to mean
/// the field was missing entirely.  Only useful in combination with `#[serde(default)]`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// The contents of the `error` member of a response.
#[derive(Debug)]
pub enum RemoteError {
    /// A proper JSON-RPC 2.0 error object with a code and a message
    Object(ErrorObjectOwned),

    /// Anything else.  JSON-RPC 1.0 servers (including Go's `net/rpc` JSON codecs) put a bare
    /// string here.
    Opaque(Value),
}

impl RemoteError {
    pub fn from_value(value: Value) -> Self {
        #[derive(Deserialize)]
        struct ErrorFields {
            code: i32,
            message: String,
            #[serde(default)]
            data: Option<Value>,
        }

        match ErrorFields::deserialize(&value) {
            Ok(ErrorFields {
                code,
                message,
                data,
            }) => RemoteError::Object(ErrorObject::owned(code, message, data)),
            Err(_) => RemoteError::Opaque(value),
        }
    }

    /// The numeric error code, if the server supplied one
    pub fn code(&self) -> Option<i32> {
        match self {
            RemoteError::Object(error) => Some(error.code()),
            RemoteError::Opaque(_) => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            RemoteError::Object(error) => error.message().to_string(),
            RemoteError::Opaque(Value::String(message)) => message.clone(),
            RemoteError::Opaque(value) => value.to_string(),
        }
    }

    /// The `data` member of an error object.
    pub fn data(&self) -> Option<Value> {
        match self {
            RemoteError::Object(error) => error
                .data()
                .and_then(|raw| serde_json::from_str(raw.get()).ok()),
            RemoteError::Opaque(_) => None,
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code() {
            // Codes defined by the JSON-RPC spec have well-known names
            Some(code @ (-32700 | -32600 | -32601 | -32602 | -32603)) => write!(
                f,
                "{} ({}): {}",
                code,
                ErrorCode::from(code).message(),
                self.message()
            ),
            Some(code) => write!(f, "{}: {}", code, self.message()),
            None => f.write_str(&self.message()),
        }
    }
}
