#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tunnel_egress_gate::{EgressGate, GateConfig};

pub const TUNNEL_ADDR: &str = "203.0.113.7";

/// Forward proxy that answers absolute-form requests for `*.tunnel.test`
/// hosts itself. Those names never resolve, so any success proves the
/// request went through the proxy.
pub struct MockProxy {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockProxy {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    let log = Arc::clone(&log);
                    tokio::spawn(async move {
                        let _ = handle(socket, log).await;
                    });
                }
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Request lines seen so far, e.g. `GET http://echo.tunnel.test/ HTTP/1.1`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, host: &str) -> usize {
        let needle = format!("http://{host}/");
        self.requests()
            .iter()
            .filter(|line| line.contains(&needle))
            .count()
    }
}

async fn handle(mut socket: TcpStream, log: Arc<Mutex<Vec<String>>>) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut buf = [0u8; 4096];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") && head.len() < 64 * 1024 {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }

    let text = String::from_utf8_lossy(&head).to_string();
    let request_line = text.lines().next().unwrap_or_default().to_string();
    log.lock().unwrap().push(request_line.clone());

    let target = request_line.split_whitespace().nth(1).unwrap_or_default();
    let (status, extra, body) = route(target).await;
    let reason = match status {
        200 => "OK",
        302 => "Found",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n{extra}\r\n{body}",
        body.len()
    );
    socket.write_all(response.as_bytes()).await?;
    socket.shutdown().await
}

async fn route(target: &str) -> (u16, String, String) {
    match target {
        "http://echo.tunnel.test/" => (200, String::new(), format!("{TUNNEL_ADDR}\n")),
        "http://echo-garbled.tunnel.test/" => (200, String::new(), "<html>captive portal</html>".into()),
        "http://echo-down.tunnel.test/" => (503, String::new(), "upstream down".into()),
        "http://echo-slow.tunnel.test/" => {
            tokio::time::sleep(Duration::from_secs(4)).await;
            (200, String::new(), format!("{TUNNEL_ADDR}\n"))
        }
        "http://echo-redirect.tunnel.test/" => (
            302,
            "Location: http://echo.tunnel.test/\r\n".into(),
            String::new(),
        ),
        "http://echo-huge.tunnel.test/" => (200, String::new(), "1".repeat(64 * 1024)),
        "http://target.tunnel.test/hello" => (200, String::new(), "hello".into()),
        "http://target.tunnel.test/fail" => (500, String::new(), "boom".into()),
        "http://target.tunnel.test/redirect" => (
            302,
            "Location: http://other.tunnel.test/landing\r\n".into(),
            String::new(),
        ),
        "http://other.tunnel.test/landing" => (200, String::new(), "landed".into()),
        "http://target.tunnel.test/ftp" => (
            302,
            "Location: ftp://other.tunnel.test/file\r\n".into(),
            String::new(),
        ),
        "http://target.tunnel.test/loop" => (
            302,
            "Location: http://target.tunnel.test/loop\r\n".into(),
            String::new(),
        ),
        "http://target.tunnel.test/slow" => {
            tokio::time::sleep(Duration::from_secs(4)).await;
            (200, String::new(), "too late".into())
        }
        "http://geo.tunnel.test/" => (
            200,
            "Content-Type: application/json\r\n".into(),
            format!("{{\"ip\":\"{TUNNEL_ADDR}\",\"country\":\"NL\"}}"),
        ),
        _ => (404, String::new(), "not found".into()),
    }
}

/// Gate config pointed at `proxy`, with overrides applied on top.
pub fn config_for(proxy: &str, overrides: &[(&str, &str)]) -> GateConfig {
    let mut pairs: Vec<(String, String)> = vec![
        ("VPN_PROXY_URL".into(), proxy.to_string()),
        ("EGRESS_PROBE_URL".into(), "http://echo.tunnel.test/".into()),
        ("EGRESS_LOCATION_URL".into(), "http://geo.tunnel.test/".into()),
        ("EGRESS_PROBE_TIMEOUT_SECS".into(), "2".into()),
        ("EGRESS_CONNECT_TIMEOUT_SECS".into(), "2".into()),
        ("EGRESS_REQUEST_TIMEOUT_SECS".into(), "2".into()),
    ];
    for (key, value) in overrides {
        pairs.retain(|(k, _)| k != key);
        pairs.push((key.to_string(), value.to_string()));
    }
    GateConfig::from_lookup(|key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    })
    .unwrap()
}

pub fn gate_for(proxy: &str, overrides: &[(&str, &str)]) -> EgressGate {
    EgressGate::from_config(Arc::new(config_for(proxy, overrides))).unwrap()
}

/// Address of a port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
