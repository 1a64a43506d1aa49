//! Pre-flight tunnel identity probe.
//!
//! One request through the proxy to an address echo service. A probe either
//! yields a syntactically valid IP address or fails; it never retries.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::GateConfig;
use crate::transport::{proxied_client, RequestError};

/// Longest echo body accepted; an IPv6 literal with zone id fits comfortably.
const MAX_ECHO_BODY: usize = 256;

#[async_trait]
pub trait TunnelProbe: Send + Sync {
    async fn probe(&self) -> ProbeResult;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Verified(IpAddr),
    Failed(ProbeFailure),
}

impl ProbeResult {
    pub fn is_verified(&self) -> bool {
        matches!(self, ProbeResult::Verified(_))
    }

    /// Present only for a verified probe.
    pub fn address(&self) -> Option<IpAddr> {
        match self {
            ProbeResult::Verified(addr) => Some(*addr),
            ProbeResult::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeFailure {
    #[error("proxy unreachable: {0}")]
    ProxyUnreachable(String),
    #[error("echo service returned HTTP {0}")]
    Status(u16),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("echo service did not return an IP address")]
    MalformedAddress,
    #[error("probe failed: {0}")]
    Transport(String),
}

/// Parses an echo service body into an address, ignoring surrounding whitespace.
pub fn parse_echo_body(body: &[u8]) -> Result<IpAddr, ProbeFailure> {
    if body.len() > MAX_ECHO_BODY {
        return Err(ProbeFailure::MalformedAddress);
    }
    std::str::from_utf8(body)
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .ok_or(ProbeFailure::MalformedAddress)
}

/// Probe that asks the echo service, through the proxy, which address it sees.
pub struct ProxyProbe {
    client: Client,
    echo_url: Url,
    deadline: Duration,
}

impl ProxyProbe {
    pub fn new(config: &GateConfig) -> Result<Self, RequestError> {
        // Redirects are not followed: a 3xx is a failed probe.
        let client = proxied_client(
            &config.proxy_url,
            config.probe_timeout,
            config.probe_timeout,
            Policy::none(),
        )?;
        if config.probe_url.scheme() != "https" {
            warn!(probe_url = %config.probe_url, "tunnel probe is not using https");
        }
        Ok(Self {
            client,
            echo_url: config.probe_url.clone(),
            deadline: config.probe_timeout,
        })
    }

    async fn run(&self) -> Result<IpAddr, ProbeFailure> {
        let mut response = self
            .client
            .get(self.echo_url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeFailure::Status(status.as_u16()));
        }

        if response
            .content_length()
            .map_or(false, |len| len > MAX_ECHO_BODY as u64)
        {
            return Err(ProbeFailure::MalformedAddress);
        }
        let mut body = Vec::with_capacity(64);
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            body.extend_from_slice(&chunk);
            if body.len() > MAX_ECHO_BODY {
                return Err(ProbeFailure::MalformedAddress);
            }
        }
        parse_echo_body(&body)
    }

    fn classify(&self, err: reqwest::Error) -> ProbeFailure {
        if err.is_timeout() {
            ProbeFailure::Timeout(self.deadline)
        } else if err.is_connect() {
            ProbeFailure::ProxyUnreachable(err.to_string())
        } else {
            ProbeFailure::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl TunnelProbe for ProxyProbe {
    async fn probe(&self) -> ProbeResult {
        let outcome = match tokio::time::timeout(self.deadline, self.run()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeFailure::Timeout(self.deadline)),
        };

        match outcome {
            Ok(addr) => {
                debug!(address = %addr, "tunnel probe verified");
                ProbeResult::Verified(addr)
            }
            Err(failure) => {
                warn!(error = %failure, "tunnel probe failed");
                ProbeResult::Failed(failure)
            }
        }
    }
}
