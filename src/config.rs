use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use url::Url;
use thiserror::Error;

pub const DEFAULT_PROXY_URL: &str = "http://localhost:8888";
pub const DEFAULT_PORT: u16 = 3100;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PROBE_URL: &str = "https://ifconfig.me";
pub const DEFAULT_LOCATION_URL: &str = "https://ipinfo.io";

/// Proxy schemes the HTTP client can route through.
const PROXY_SCHEMES: [&str; 4] = ["http", "https", "socks5", "socks5h"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Log output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Read on its own so logging can start before the rest of the
    /// configuration is parsed.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("LOG_FORMAT").map(|raw| raw.trim().to_ascii_lowercase()) {
            Some(raw) if raw == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Process-wide gate configuration.
///
/// Built once at startup and shared read-only (behind an `Arc`) with the
/// prober, the executor and the façade.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Tunnel endpoint every outbound request is routed through.
    pub proxy_url: Url,
    pub listen_addr: SocketAddr,
    /// "Echo my address" service used by the pre-flight probe.
    pub probe_url: Url,
    /// Location lookup performed by the `identity` operation.
    pub location_url: Url,
    pub probe_timeout: Duration,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_redirects: usize,
    /// Reject shell metacharacters in URLs, not only control characters.
    pub strict_url_chars: bool,
}

impl GateConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to
    /// defaults for missing keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let proxy_url = parse_proxy_url(&get("VPN_PROXY_URL", DEFAULT_PROXY_URL))?;

        let port_raw = get("PORT", &DEFAULT_PORT.to_string());
        let port: u16 = port_raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid("PORT", &port_raw, "expected a port number"))?;

        let bind_raw = get("EGRESS_BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_ip: IpAddr = bind_raw.trim().parse().map_err(|_| {
            ConfigError::invalid("EGRESS_BIND_ADDR", &bind_raw, "expected an IP address")
        })?;

        let probe_url = parse_service_url(
            "EGRESS_PROBE_URL",
            &get("EGRESS_PROBE_URL", DEFAULT_PROBE_URL),
        )?;
        let location_url = parse_service_url(
            "EGRESS_LOCATION_URL",
            &get("EGRESS_LOCATION_URL", DEFAULT_LOCATION_URL),
        )?;

        let probe_timeout = parse_secs(
            "EGRESS_PROBE_TIMEOUT_SECS",
            &get("EGRESS_PROBE_TIMEOUT_SECS", "5"),
        )?;
        let connect_timeout = parse_secs(
            "EGRESS_CONNECT_TIMEOUT_SECS",
            &get("EGRESS_CONNECT_TIMEOUT_SECS", "10"),
        )?;
        let request_timeout = parse_secs(
            "EGRESS_REQUEST_TIMEOUT_SECS",
            &get("EGRESS_REQUEST_TIMEOUT_SECS", "30"),
        )?;

        let redirects_raw = get("EGRESS_MAX_REDIRECTS", "10");
        let max_redirects: usize = redirects_raw.trim().parse().map_err(|_| {
            ConfigError::invalid(
                "EGRESS_MAX_REDIRECTS",
                &redirects_raw,
                "expected a non-negative integer",
            )
        })?;

        let strict_url_chars = parse_bool(
            "EGRESS_STRICT_URL_CHARS",
            &get("EGRESS_STRICT_URL_CHARS", "true"),
        )?;

        Ok(Self {
            proxy_url,
            listen_addr: SocketAddr::new(bind_ip, port),
            probe_url,
            location_url,
            probe_timeout,
            connect_timeout,
            request_timeout,
            max_redirects,
            strict_url_chars,
        })
    }

    /// Proxy endpoint with any credentials stripped, for logs and reports.
    pub fn proxy_display(&self) -> String {
        let host = self.proxy_url.host_str().unwrap_or("?");
        match self.proxy_url.port_or_known_default() {
            Some(port) => format!("{}://{}:{}", self.proxy_url.scheme(), host, port),
            None => format!("{}://{}", self.proxy_url.scheme(), host),
        }
    }
}

fn parse_proxy_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::invalid("VPN_PROXY_URL", raw, e.to_string()))?;
    if !PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigError::invalid(
            "VPN_PROXY_URL",
            raw,
            format!("unsupported proxy scheme {}", url.scheme()),
        ));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::invalid("VPN_PROXY_URL", raw, "missing proxy host"));
    }
    Ok(url)
}

fn parse_service_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::invalid(key, raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::invalid(key, raw, format!("unsupported scheme {other}"))),
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, raw, "expected whole seconds"))?;
    if secs == 0 {
        return Err(ConfigError::invalid(key, raw, "timeouts must be non-zero"));
    }
    Ok(Duration::from_secs(secs))
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected true or false")),
    }
}
