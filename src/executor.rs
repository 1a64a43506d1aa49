//! Guarded request executor.
//!
//! Validate, probe, then send through the proxy. A rejected draft or a failed
//! probe ends the pipeline before the transport is touched.

use std::sync::Arc;

use tracing::{info, warn};

use crate::outcome::OutcomeRecord;
use crate::probe::{ProbeResult, TunnelProbe};
use crate::stats::GateStats;
use crate::transport::EgressTransport;
use crate::validate::{RequestDraft, Validator};

pub struct GuardedExecutor {
    validator: Validator,
    probe: Arc<dyn TunnelProbe>,
    transport: Arc<dyn EgressTransport>,
    stats: Arc<GateStats>,
}

impl GuardedExecutor {
    pub fn new(
        validator: Validator,
        probe: Arc<dyn TunnelProbe>,
        transport: Arc<dyn EgressTransport>,
        stats: Arc<GateStats>,
    ) -> Self {
        Self {
            validator,
            probe,
            transport,
            stats,
        }
    }

    /// Runs a fresh probe. Results are never cached between calls.
    pub async fn verify_tunnel(&self) -> ProbeResult {
        let result = self.probe.probe().await;
        self.stats.probe_finished(result.is_verified());
        result
    }

    pub async fn execute(&self, draft: &RequestDraft) -> OutcomeRecord {
        let spec = match self.validator.validate(draft) {
            Ok(spec) => spec,
            Err(err) => {
                warn!(error = %err, "request rejected by validation");
                self.stats.request_blocked();
                return OutcomeRecord::rejected(&err);
            }
        };

        let address = match self.verify_tunnel().await {
            ProbeResult::Verified(addr) => addr,
            ProbeResult::Failed(failure) => {
                warn!(error = %failure, "request blocked: tunnel not verified");
                self.stats.request_blocked();
                return OutcomeRecord::tunnel_unverified(&failure);
            }
        };

        info!(
            method = %spec.method(),
            host = spec.url().host_str().unwrap_or_default(),
            tunnel_ip = %address,
            "forwarding request through tunnel"
        );

        self.stats.request_started();
        // Runs on completion and when the caller drops this future.
        let _in_flight = scopeguard::guard(&self.stats, |stats| stats.request_finished());

        match self.transport.send(&spec).await {
            Ok(response) => OutcomeRecord::completed(address, response),
            Err(err) => {
                warn!(error = %err, tunnel_ip = %address, "tunnelled request failed");
                self.stats.request_failed();
                OutcomeRecord::request_failed(address, &err)
            }
        }
    }
}
