use std::sync::Arc;

use tracing::info;

use crate::config::GateConfig;
use crate::executor::GuardedExecutor;
use crate::outcome::OutcomeRecord;
use crate::probe::{ProbeResult, ProxyProbe, TunnelProbe};
use crate::stats::{GateStats, StatsSnapshot};
use crate::transport::{EgressTransport, ProxiedTransport, RequestError};
use crate::validate::{HttpMethod, RequestDraft, Validator};

/// Result of the `identity` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityReport {
    pub probe: ProbeResult,
    /// Guarded location lookup; `None` when the probe failed.
    pub lookup: Option<OutcomeRecord>,
}

/// The three operations exposed to callers.
pub struct EgressGate {
    config: Arc<GateConfig>,
    executor: GuardedExecutor,
    stats: Arc<GateStats>,
}

impl EgressGate {
    /// Wires the real probe and transport to the configured proxy.
    pub fn from_config(config: Arc<GateConfig>) -> Result<Self, RequestError> {
        let probe = Arc::new(ProxyProbe::new(&config)?);
        let transport = Arc::new(ProxiedTransport::new(&config)?);
        Ok(Self::with_parts(config, probe, transport))
    }

    pub fn with_parts(
        config: Arc<GateConfig>,
        probe: Arc<dyn TunnelProbe>,
        transport: Arc<dyn EgressTransport>,
    ) -> Self {
        let stats = GateStats::new();
        let executor = GuardedExecutor::new(
            Validator::new(config.strict_url_chars),
            probe,
            transport,
            Arc::clone(&stats),
        );
        Self {
            config,
            executor,
            stats,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn fetch(&self, url: &str, method: &str) -> OutcomeRecord {
        self.fetch_draft(&RequestDraft::new(url, method)).await
    }

    pub async fn fetch_draft(&self, draft: &RequestDraft) -> OutcomeRecord {
        self.executor.execute(draft).await
    }

    /// Probes, then on success runs a guarded lookup against the location
    /// service. The lookup probes again like any guarded request.
    pub async fn identity(&self) -> IdentityReport {
        let probe = self.executor.verify_tunnel().await;
        if !probe.is_verified() {
            return IdentityReport {
                probe,
                lookup: None,
            };
        }

        let draft = RequestDraft::new(self.config.location_url.as_str(), HttpMethod::Get.as_str());
        let lookup = self.executor.execute(&draft).await;
        IdentityReport {
            probe,
            lookup: Some(lookup),
        }
    }

    /// Probe only; no substantive request is made.
    pub async fn protection_status(&self) -> OutcomeRecord {
        match self.executor.verify_tunnel().await {
            ProbeResult::Verified(addr) => {
                info!(tunnel_ip = %addr, "protection status: tunnel verified");
                OutcomeRecord::tunnel_verified(addr)
            }
            ProbeResult::Failed(failure) => OutcomeRecord::tunnel_unverified(&failure),
        }
    }
}
