use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Gate counters. Reporting only: nothing in the pipeline reads them back.
pub struct GateStats {
    probes_total: AtomicU64,
    probes_failed: AtomicU64,
    requests_blocked: AtomicU64,
    requests_forwarded: AtomicU64,
    requests_failed: AtomicU64,
    in_flight: AtomicU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub probes_total: u64,
    pub probes_failed: u64,
    pub requests_blocked: u64,
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub in_flight: u32,
}

impl GateStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            probes_total: AtomicU64::new(0),
            probes_failed: AtomicU64::new(0),
            requests_blocked: AtomicU64::new(0),
            requests_forwarded: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            in_flight: AtomicU32::new(0),
        })
    }

    pub fn probe_finished(&self, verified: bool) {
        self.probes_total.fetch_add(1, Ordering::Relaxed);
        if !verified {
            self.probes_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn request_blocked(&self) {
        self.requests_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_started(&self) {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.requests_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_finished(&self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            probes_total: self.probes_total.load(Ordering::Relaxed),
            probes_failed: self.probes_failed.load(Ordering::Relaxed),
            requests_blocked: self.requests_blocked.load(Ordering::Relaxed),
            requests_forwarded: self.requests_forwarded.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
        }
    }
}
