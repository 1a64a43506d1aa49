//! Test-only probe and transport doubles with call counters.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::probe::{ProbeFailure, ProbeResult, TunnelProbe};
use crate::transport::{EgressResponse, EgressTransport, RequestError};
use crate::validate::RequestSpec;

pub const TUNNEL_ADDR: &str = "203.0.113.7";

pub fn tunnel_addr() -> IpAddr {
    TUNNEL_ADDR.parse().unwrap()
}

/// Probe that always returns the same result.
pub struct FixedProbe {
    result: ProbeResult,
    calls: AtomicUsize,
}

impl FixedProbe {
    pub fn verified() -> Arc<Self> {
        Self::returning(ProbeResult::Verified(tunnel_addr()))
    }

    pub fn failing() -> Arc<Self> {
        Self::returning(ProbeResult::Failed(ProbeFailure::ProxyUnreachable(
            "connection refused".to_string(),
        )))
    }

    pub fn returning(result: ProbeResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TunnelProbe for FixedProbe {
    async fn probe(&self) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Transport that records every request and replays a canned reply.
pub struct ScriptedTransport {
    reply: Result<EgressResponse, RequestError>,
    sent: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn ok(status: u16, body: &str) -> Arc<Self> {
        Self::replying(Ok(EgressResponse {
            status,
            body: body.to_string(),
        }))
    }

    pub fn failing(err: RequestError) -> Arc<Self> {
        Self::replying(Err(err))
    }

    fn replying(reply: Result<EgressResponse, RequestError>) -> Arc<Self> {
        Arc::new(Self {
            reply,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EgressTransport for ScriptedTransport {
    async fn send(&self, request: &RequestSpec) -> Result<EgressResponse, RequestError> {
        self.sent
            .lock()
            .unwrap()
            .push(format!("{} {}", request.method(), request.url()));
        // Mirror a real transport: 4xx/5xx replies are hard failures.
        match &self.reply {
            Ok(response) if response.status >= 400 => Err(RequestError::HttpStatus {
                status: response.status,
            }),
            other => other.clone(),
        }
    }
}

/// Transport whose sends never complete.
pub struct HangingTransport {
    entered: Notify,
}

impl HangingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: Notify::new(),
        })
    }

    /// Resolves once a send has started.
    pub async fn entered(&self) {
        self.entered.notified().await
    }
}

#[async_trait]
impl EgressTransport for HangingTransport {
    async fn send(&self, _request: &RequestSpec) -> Result<EgressResponse, RequestError> {
        self.entered.notify_one();
        std::future::pending().await
    }
}
