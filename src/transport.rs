//! Proxied HTTP transport for the real (post-probe) request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::GateConfig;
use crate::outcome::ErrorClass;
use crate::validate::RequestSpec;

/// Sends an already-validated request through the tunnel.
///
/// Implementations must never fall back to a direct connection.
#[async_trait]
pub trait EgressTransport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<EgressResponse, RequestError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Request timed out (tunnel may be slow or down)")]
    Timeout,
    #[error("The requested URL returned error: {status}")]
    HttpStatus { status: u16 },
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Redirect refused: {0}")]
    Redirect(String),
    #[error("Request failed: {0}")]
    Failed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RequestError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RequestError::Internal(_) => ErrorClass::InternalError,
            _ => ErrorClass::RequestFailed,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestError::Timeout
        } else if err.is_redirect() {
            RequestError::Redirect(error_chain(&err))
        } else if err.is_connect() {
            RequestError::Connect(error_chain(&err))
        } else if err.is_builder() {
            RequestError::Internal(error_chain(&err))
        } else {
            RequestError::Failed(error_chain(&err))
        }
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        // reqwest already folds its direct cause into its own message.
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Builds a client whose every request, redirects included, goes through
/// `proxy_url`. System proxy settings and `NO_PROXY` are not consulted.
pub fn proxied_client(
    proxy_url: &Url,
    connect_timeout: Duration,
    timeout: Duration,
    redirect: Policy,
) -> Result<Client, RequestError> {
    let proxy = Proxy::all(proxy_url.as_str()).map_err(RequestError::from_reqwest)?;
    Client::builder()
        .proxy(proxy)
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .redirect(redirect)
        .build()
        .map_err(RequestError::from_reqwest)
}

/// Follows up to `max` hops and refuses any hop leaving http/https.
fn tunnel_redirect_policy(max: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            attempt.error(format!("more than {max} redirects"))
        } else if !matches!(attempt.url().scheme(), "http" | "https") {
            let message = format!("redirect to unsupported scheme {}", attempt.url().scheme());
            attempt.error(message)
        } else {
            attempt.follow()
        }
    })
}

/// Real transport: one pooled client bound to the configured proxy.
pub struct ProxiedTransport {
    client: Client,
    deadline: Duration,
}

impl ProxiedTransport {
    pub fn new(config: &GateConfig) -> Result<Self, RequestError> {
        let client = proxied_client(
            &config.proxy_url,
            config.connect_timeout,
            config.request_timeout,
            tunnel_redirect_policy(config.max_redirects),
        )?;
        Ok(Self {
            client,
            deadline: config.request_timeout,
        })
    }

    async fn send_inner(&self, request: &RequestSpec) -> Result<EgressResponse, RequestError> {
        let mut builder = self
            .client
            .request(request.method().into(), request.url().clone());
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(RequestError::from_reqwest)?;
        let status = response.status();
        debug!(status = status.as_u16(), "tunnel response received");

        if status.is_client_error() || status.is_server_error() {
            return Err(RequestError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(RequestError::from_reqwest)?;
        Ok(EgressResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl EgressTransport for ProxiedTransport {
    async fn send(&self, request: &RequestSpec) -> Result<EgressResponse, RequestError> {
        // The client timeout covers the request; this also bounds body reads.
        match tokio::time::timeout(self.deadline, self.send_inner(request)).await {
            Ok(result) => result,
            Err(_) => Err(RequestError::Timeout),
        }
    }
}
