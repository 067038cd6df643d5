//! The JSON-RPC caller: turns a method name and some params into a request, sends it over a
//! transport, and matches the response back up to the request.
use crate::config::{ClientConfig, IdStyle, ParamsStyle};
use crate::error::{ClientError, ProtocolError, Result};
use crate::lsp;
use crate::shared::{Id, NotificationEnvelope, RequestEnvelope, ResponseEnvelope};
use crate::transport::{HttpTransport, JsonRpcTransport};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::*;

/// A JSON-RPC client bound to a single transport.
///
/// Each call is a single exchange: one request out, one response back, no retries.  The client
/// can be shared between tasks; the only state it keeps is the counter for sequential ids.
#[derive(Debug)]
pub struct JsonRpcClient<T> {
    transport: T,
    id_style: IdStyle,
    params_style: ParamsStyle,
    next_id: AtomicU64,
}

impl JsonRpcClient<HttpTransport> {
    /// Client for the HTTP endpoint described by `config`
    pub fn http(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::from_config(config)?;

        Ok(Self::new(transport)
            .with_id_style(config.id_style)
            .with_params_style(config.params_style))
    }
}

impl<T> JsonRpcClient<T>
where
    T: JsonRpcTransport,
{
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            id_style: IdStyle::default(),
            params_style: ParamsStyle::default(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_id_style(mut self, id_style: IdStyle) -> Self {
        self.id_style = id_style;
        self
    }

    pub fn with_params_style(mut self, params_style: ParamsStyle) -> Self {
        self.params_style = params_style;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Invoke `method` and return the `result` member of the response, untouched.
    ///
    /// `params` may be anything serializable; see [`ParamsStyle`] for how it ends up on the
    /// wire.  Pass `()` for a method that takes no params.
    #[instrument(skip_all, fields(method = %method, id = tracing::field::Empty))]
    pub async fn call<P>(&self, method: &str, params: P) -> Result<Value>
    where
        P: Serialize,
    {
        let request = RequestEnvelope::new(
            self.next_request_id(),
            validate_method(method)?,
            self.encode_params(method, params)?,
        );
        Span::current().record("id", tracing::field::display(&request.id));

        let message = serde_json::to_string(&request).map_err(|source| ClientError::Params {
            method: method.to_string(),
            source,
        })?;
        debug!(%message, "Sending request");

        let body = self.transport.request(message).await?;
        debug!(%body, "Received response");

        let response = ResponseEnvelope::parse(&body)?;
        correlate(request.id, response)
    }

    /// Invoke `method` and decode its result into `R`
    pub async fn call_as<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let result = self.call(method, params).await?;

        serde_json::from_value(result).map_err(|source| ClientError::Decode {
            method: method.to_string(),
            source,
        })
    }

    /// Send a notification.  There is no id and no response, so the only errors are local ones
    /// and transport failures.
    #[instrument(skip_all, fields(method = %method))]
    pub async fn notify<P>(&self, method: &str, params: P) -> Result<()>
    where
        P: Serialize,
    {
        let notification =
            NotificationEnvelope::new(validate_method(method)?, self.encode_params(method, params)?);

        let message =
            serde_json::to_string(&notification).map_err(|source| ClientError::Params {
                method: method.to_string(),
                source,
            })?;
        debug!(%message, "Sending notification");

        self.transport.notify(message).await?;
        Ok(())
    }

    /// The LSP handshake.  With the default [`ParamsStyle::Positional`] the params go out as
    /// `[{"processId": .., "rootPath": .., "capabilities": ..}]`.
    pub async fn initialize(
        &self,
        params: &lsp::InitializeParams,
    ) -> Result<lsp::InitializeResult> {
        self.call_as(lsp::INITIALIZE, params).await
    }

    fn next_request_id(&self) -> Id<'static> {
        match self.id_style {
            IdStyle::Uuid => Id::Str(uuid::Uuid::new_v4().to_string().into()),
            IdStyle::Sequential => Id::Number(self.next_id.fetch_add(1, Ordering::Relaxed)),
        }
    }

    fn encode_params<P>(&self, method: &str, params: P) -> Result<Option<Value>>
    where
        P: Serialize,
    {
        let params = serde_json::to_value(params).map_err(|source| ClientError::Params {
            method: method.to_string(),
            source,
        })?;

        Ok(match (self.params_style, params) {
            (_, Value::Null) => None,
            (ParamsStyle::Positional, Value::Array(params)) => Some(Value::Array(params)),
            (ParamsStyle::Positional, params) => Some(Value::Array(vec![params])),
            (ParamsStyle::ByName, params) => Some(params),
        })
    }
}

fn validate_method(method: &str) -> Result<&str> {
    if method.trim().is_empty() {
        return Err(ClientError::InvalidMethod);
    }

    Ok(method)
}

/// Match a response to the request that produced it.
///
/// An error response with a `null` id still belongs to us: that is what servers send when they
/// couldn't even parse the request far enough to find its id.
fn correlate(expected: Id<'static>, response: ResponseEnvelope) -> Result<Value> {
    let ResponseEnvelope { id, outcome } = response;

    if id != expected && !(id == Id::Null && outcome.is_err()) {
        warn!(%expected, actual = %id, "Response id does not match request id");
        return Err(ProtocolError::IdMismatch {
            expected,
            actual: id,
        }
        .into());
    }

    outcome.map_err(|error| ClientError::Rpc {
        id: expected,
        error,
    })
}
