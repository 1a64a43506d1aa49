//! Text rendering of gate outcomes.
//!
//! Every rendering carries a `[TUNNEL IP: ...]` line, with `UNKNOWN` or `N/A`
//! when no verified address exists.

use crate::gate::IdentityReport;
use crate::outcome::{OutcomeRecord, TunnelIdentity};
use crate::probe::ProbeResult;
use crate::stats::StatsSnapshot;

fn identity_line(identity: &TunnelIdentity) -> String {
    format!("[TUNNEL IP: {identity}]")
}

pub fn render_fetch(record: &OutcomeRecord) -> String {
    let identity = identity_line(&record.observed());
    let error = record.error().unwrap_or("unknown error");

    if record.is_blocked() {
        format!("BLOCKED: {error}\n{identity}")
    } else if !record.is_success() {
        format!("{identity}\nError: {error}")
    } else {
        format!("{identity}\n\n{}", record.payload().unwrap_or_default())
    }
}

pub fn render_identity(report: &IdentityReport) -> String {
    let addr = match &report.probe {
        ProbeResult::Verified(addr) => *addr,
        ProbeResult::Failed(failure) => {
            return format!(
                "TUNNEL VERIFICATION FAILED\n{}\nCould not connect through the tunnel proxy ({failure}).\nCheck that the tunnel endpoint is running and healthy.",
                identity_line(&TunnelIdentity::Unknown)
            );
        }
    };

    match &report.lookup {
        Some(lookup) if lookup.is_success() => format!(
            "TUNNEL VERIFIED: {addr}\n{}\n\n{}",
            identity_line(&TunnelIdentity::Verified(addr)),
            lookup.payload().unwrap_or_default()
        ),
        Some(lookup) => {
            // A blocked lookup means the second check failed after the first passed.
            let what = if lookup.is_blocked() {
                "location lookup was blocked"
            } else {
                "location lookup failed"
            };
            format!(
                "TUNNEL IP: {addr} (verified)\n{}\nBut {what}: {}",
                identity_line(&TunnelIdentity::Verified(addr)),
                lookup.error().unwrap_or("unknown error")
            )
        }
        None => format!(
            "TUNNEL VERIFIED: {addr}\n{}",
            identity_line(&TunnelIdentity::Verified(addr))
        ),
    }
}

pub fn render_protection_status(record: &OutcomeRecord, proxy: &str, stats: &StatsSnapshot) -> String {
    let counters = format!(
        "Gate counters: probes={} failed_probes={} forwarded={} blocked={} failed={} in_flight={}",
        stats.probes_total,
        stats.probes_failed,
        stats.requests_forwarded,
        stats.requests_blocked,
        stats.requests_failed,
        stats.in_flight,
    );

    if record.is_success() {
        format!(
            "Tunnel Protection Active\n\
             \n\
             {}\n\
             Current tunnel IP: {}\n\
             Proxy endpoint: {proxy}\n\
             \n\
             Protection layers:\n\
             1. Pre-flight probe: egress address verified through the proxy\n\
             2. Fail-hard requests: no direct fallback, HTTP 4xx/5xx reported as failures\n\
             3. Tunnel identity attached to every response\n\
             4. Network isolation and kill switch: enforced externally, not by this process\n\
             \n\
             {counters}",
            identity_line(&record.observed()),
            record.observed(),
        )
    } else {
        format!(
            "Tunnel Protection Check Failed\n\
             \n\
             {}\n\
             Proxy endpoint: {proxy}\n\
             Reason: {}\n\
             \n\
             Possible issues:\n\
             - the tunnel endpoint may be unhealthy\n\
             - the tunnel may be disconnected\n\
             - network connectivity issues\n\
             \n\
             All guarded requests are blocked until the probe succeeds.\n\
             Network isolation enforcement is external to this process and was not checked.\n\
             \n\
             {counters}",
            identity_line(&record.observed()),
            record.error().unwrap_or("unknown error"),
        )
    }
}
