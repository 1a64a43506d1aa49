use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use tunnel_egress_gate::{facade, logging, EgressGate, GateConfig, LogFormat};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::init(LogFormat::from_env());
    let config = Arc::new(GateConfig::from_env().map_err(|err| {
        error!(error = %err, "invalid configuration");
        err
    })?);

    info!(
        listen_addr = %config.listen_addr,
        proxy = %config.proxy_display(),
        probe_url = %config.probe_url,
        strict_url_chars = config.strict_url_chars,
        "tunnel egress gate starting"
    );
    warn!("network isolation (kill switch) is not enforced by this process");

    let gate = Arc::new(EgressGate::from_config(Arc::clone(&config)).map_err(|err| {
        error!(error = %err, "failed to build the proxied clients");
        err
    })?);
    let listener = TcpListener::bind(config.listen_addr).await.map_err(|err| {
        error!(error = %err, addr = %config.listen_addr, "failed to bind listener");
        err
    })?;
    facade::serve(listener, gate).await?;

    Ok(())
}
