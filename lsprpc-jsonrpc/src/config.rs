use crate::error::TransportError;
use std::time::Duration;

/// Port the ctags language server listens on when serving HTTP
pub const DEFAULT_PORT: u16 = 9090;

pub const DEFAULT_HOST: &str = "localhost";

/// How request ids are generated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdStyle {
    /// Random UUID v4 strings
    #[default]
    Uuid,

    /// Numbers counting up from 1, per client
    Sequential,
}

/// How the value passed as `params` is put on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParamsStyle {
    /// Params are always a positional array.  Anything that isn't already an array is sent as
    /// the sole element of one, so `{..}` goes out as `[{..}]`.
    #[default]
    Positional,

    /// Params are sent exactly as serialized, which is what LSP servers proper expect.
    ByName,
}

/// Where the server is and how to talk to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,

    /// HTTP path the JSON-RPC endpoint is mounted on
    pub path: String,

    /// Per-request timeout.  `None` waits as long as the server takes.
    pub timeout: Option<Duration>,

    pub id_style: IdStyle,
    pub params_style: ParamsStyle,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: "/".to_string(),
            timeout: None,
            id_style: IdStyle::default(),
            params_style: ParamsStyle::default(),
        }
    }
}

impl ClientConfig {
    /// The HTTP URL requests are POSTed to
    pub fn endpoint(&self) -> Result<reqwest::Url, TransportError> {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        let endpoint = format!("http://{}:{}{}", self.host, self.port, path);

        reqwest::Url::parse(&endpoint).map_err(|e| TransportError::InvalidEndpoint {
            reason: e.to_string(),
            endpoint,
        })
    }

    /// `host:port`, for stream transports
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
