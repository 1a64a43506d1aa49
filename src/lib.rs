//! Fail-hard egress gate.
//!
//! Every outbound request is validated, preceded by a fresh probe proving the
//! tunnel is in use, and sent only through the configured proxy. Results always
//! carry the observed tunnel identity.

pub mod config;
pub mod executor;
pub mod facade;
pub mod gate;
pub mod logging;
pub mod outcome;
pub mod probe;
pub mod report;
pub mod stats;
pub mod transport;
pub mod validate;

#[cfg(test)]
mod test_transport;

pub use config::{ConfigError, GateConfig, LogFormat};
pub use executor::GuardedExecutor;
pub use gate::{EgressGate, IdentityReport};
pub use outcome::{ErrorClass, OutcomeRecord, TunnelIdentity};
pub use probe::{ProbeFailure, ProbeResult, ProxyProbe, TunnelProbe};
pub use transport::{EgressResponse, EgressTransport, ProxiedTransport, RequestError};
pub use validate::{HttpMethod, RequestDraft, RequestSpec, ValidationError, Validator};
