use std::fmt;
use std::net::IpAddr;

use serde::{Serialize, Serializer};

use crate::probe::ProbeFailure;
use crate::transport::{EgressResponse, RequestError};
use crate::validate::ValidationError;

pub const UNKNOWN_IDENTITY: &str = "UNKNOWN";
pub const NOT_CHECKED_IDENTITY: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ValidationRejected,
    TunnelVerificationFailed,
    RequestFailed,
    InternalError,
}

/// Egress address observed through the tunnel for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelIdentity {
    Verified(IpAddr),
    /// The probe ran and could not prove the tunnel.
    Unknown,
    /// The request was rejected before any probe.
    NotChecked,
}

impl TunnelIdentity {
    pub fn address(&self) -> Option<IpAddr> {
        match self {
            TunnelIdentity::Verified(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl fmt::Display for TunnelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelIdentity::Verified(addr) => write!(f, "{addr}"),
            TunnelIdentity::Unknown => f.write_str(UNKNOWN_IDENTITY),
            TunnelIdentity::NotChecked => f.write_str(NOT_CHECKED_IDENTITY),
        }
    }
}

impl Serialize for TunnelIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of one gate operation, as returned to callers.
///
/// `success` and `blocked` are never both set. `blocked` means the real
/// request was never attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    success: bool,
    blocked: bool,
    observed: TunnelIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    payload: Option<String>,
    error_class: Option<ErrorClass>,
    error: Option<String>,
}

impl OutcomeRecord {
    pub fn rejected(err: &ValidationError) -> Self {
        Self::blocked_with(TunnelIdentity::NotChecked, ErrorClass::ValidationRejected, err.to_string())
    }

    pub fn tunnel_unverified(failure: &ProbeFailure) -> Self {
        Self::blocked_with(
            TunnelIdentity::Unknown,
            ErrorClass::TunnelVerificationFailed,
            format!("tunnel verification failed: could not confirm egress through the tunnel proxy ({failure})"),
        )
    }

    pub fn completed(address: IpAddr, response: EgressResponse) -> Self {
        Self {
            success: true,
            blocked: false,
            observed: TunnelIdentity::Verified(address),
            status: Some(response.status),
            payload: Some(response.body),
            error_class: None,
            error: None,
        }
    }

    pub fn request_failed(address: IpAddr, err: &RequestError) -> Self {
        let status = match err {
            RequestError::HttpStatus { status } => Some(*status),
            _ => None,
        };
        Self {
            success: false,
            blocked: false,
            observed: TunnelIdentity::Verified(address),
            status,
            payload: None,
            error_class: Some(err.class()),
            error: Some(err.to_string()),
        }
    }

    /// Probe-only outcome used by the protection status check.
    pub fn tunnel_verified(address: IpAddr) -> Self {
        Self {
            success: true,
            blocked: false,
            observed: TunnelIdentity::Verified(address),
            status: None,
            payload: None,
            error_class: None,
            error: None,
        }
    }

    fn blocked_with(observed: TunnelIdentity, class: ErrorClass, error: String) -> Self {
        Self {
            success: false,
            blocked: true,
            observed,
            status: None,
            payload: None,
            error_class: Some(class),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn observed(&self) -> TunnelIdentity {
        self.observed
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        self.error_class
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_render_as_text() {
        assert_eq!(TunnelIdentity::Unknown.to_string(), "UNKNOWN");
        assert_eq!(TunnelIdentity::NotChecked.to_string(), "N/A");
        let addr: IpAddr = "203.0.113.7".parse().unwrap();
        assert_eq!(TunnelIdentity::Verified(addr).to_string(), "203.0.113.7");
    }

    #[test]
    fn blocked_records_are_never_successful() {
        let rejected = OutcomeRecord::rejected(&ValidationError::MissingHost);
        let unverified = OutcomeRecord::tunnel_unverified(&ProbeFailure::MalformedAddress);
        for record in [rejected, unverified] {
            assert!(record.is_blocked());
            assert!(!record.is_success());
            assert!(record.payload().is_none());
        }
    }

    #[test]
    fn failed_request_keeps_identity_and_status() {
        let addr: IpAddr = "203.0.113.7".parse().unwrap();
        let record = OutcomeRecord::request_failed(addr, &RequestError::HttpStatus { status: 502 });
        assert!(!record.is_blocked());
        assert_eq!(record.observed().address(), Some(addr));
        assert_eq!(record.status(), Some(502));
        assert_eq!(record.error_class(), Some(ErrorClass::RequestFailed));
    }

    #[test]
    fn serializes_identity_as_string() {
        let record = OutcomeRecord::tunnel_unverified(&ProbeFailure::Timeout(std::time::Duration::from_secs(5)));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["observed"], "UNKNOWN");
        assert_eq!(json["blocked"], true);
        assert_eq!(json["error_class"], "tunnel_verification_failed");
        assert!(json.get("status").is_none());
    }
}
