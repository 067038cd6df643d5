//! JSON-RPC over HTTP: every message is the body of its own `POST`, and the response body is the
//! JSON-RPC response.
use super::JsonRpcTransport;
use crate::config::ClientConfig;
use crate::error::TransportError;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::*;

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(endpoint: reqwest::Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let transport = Self::new(config.endpoint()?);

        Ok(match config.timeout {
            Some(timeout) => transport.with_timeout(timeout),
            None => transport,
        })
    }

    /// Give up on any request that takes longer than `timeout` to complete
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }

    async fn post(&self, message: String) -> Result<(reqwest::StatusCode, String), TransportError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(message);

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        trace!(%status, body_len = body.len(), "HTTP response received");

        Ok((status, body))
    }
}

#[async_trait::async_trait]
impl JsonRpcTransport for HttpTransport {
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn request(&self, message: String) -> Result<String, TransportError> {
        let (status, body) = self.post(message).await?;

        // Plenty of servers report JSON-RPC errors with a 4xx/5xx status.  If the body is JSON,
        // let the client decode the error from it, otherwise there's nothing better to report
        // than the status itself.
        if !status.is_success()
            && serde_json::from_str::<serde::de::IgnoredAny>(&body).is_err()
        {
            debug!(%status, "HTTP request failed with a non-JSON body");
            return Err(TransportError::Status { status, body });
        }

        Ok(body)
    }

    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    async fn notify(&self, message: String) -> Result<(), TransportError> {
        let (status, body) = self.post(message).await?;

        if !status.is_success() {
            debug!(%status, "HTTP notification was rejected");
            return Err(TransportError::Status { status, body });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::init_test_logging;
    use assert_matches::assert_matches;
    use axum::{http::StatusCode, routing::post, Router};
    use std::net::SocketAddr;

    /// Serve `app` on an ephemeral localhost port, returning the address
    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        addr
    }

    fn transport_for(addr: SocketAddr) -> HttpTransport {
        HttpTransport::new(format!("http://{}/", addr).parse().unwrap())
    }

    #[tokio::test]
    async fn posts_message_and_returns_body() {
        init_test_logging();

        let app = Router::new().route(
            "/",
            post(|body: String| async move { format!(r#"{{"echo": {}}}"#, body) }),
        );
        let transport = transport_for(serve(app).await);

        let response = transport.request(r#"{"hello": 1}"#.to_string()).await.unwrap();
        assert_eq!(response, r#"{"echo": {"hello": 1}}"#);
    }

    #[tokio::test]
    async fn error_status_with_json_body_is_passed_through() {
        init_test_logging();

        let app = Router::new().route(
            "/",
            post(|| async {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    r#"{"id": 1, "error": {"code": -32603, "message": "boom"}}"#,
                )
            }),
        );
        let transport = transport_for(serve(app).await);

        let response = transport.request("{}".to_string()).await.unwrap();
        assert!(response.contains("boom"));
    }

    #[tokio::test]
    async fn error_status_without_json_body() {
        init_test_logging();

        let app = Router::new().route(
            "/",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream unavailable") }),
        );
        let transport = transport_for(serve(app).await);

        let result = transport.request("{}".to_string()).await;
        assert_matches!(result, Err(TransportError::Status { status, ref body }) => {
            assert_eq!(status, reqwest::StatusCode::BAD_GATEWAY);
            assert_eq!(body, "upstream unavailable");
        });
    }

    #[tokio::test]
    async fn notification_ignores_empty_body() {
        init_test_logging();

        let app = Router::new().route("/", post(|| async { StatusCode::NO_CONTENT }));
        let transport = transport_for(serve(app).await);

        transport.notify("{}".to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn connection_refused() {
        init_test_logging();

        // Grab a free port, then close it again so nothing is listening there
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let transport = transport_for(addr);

        let error = transport.request("{}".to_string()).await.unwrap_err();
        assert!(error.is_connect(), "expected connect error, got {:?}", error);
        assert!(!error.is_timeout());
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        init_test_logging();

        let app = Router::new().route(
            "/",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        );
        let transport = transport_for(serve(app).await).with_timeout(Duration::from_millis(100));

        let error = transport.request("{}".to_string()).await.unwrap_err();
        assert!(error.is_timeout(), "expected timeout, got {:?}", error);
    }
}
