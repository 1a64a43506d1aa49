//! Thin HTTP tool façade over [`EgressGate`].
//!
//! Blocked and failed outcomes are returned in-band as rendered text with a
//! 200 status, exactly as the operations render them.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::gate::EgressGate;
use crate::outcome::OutcomeRecord;
use crate::report;
use crate::validate::RequestDraft;

pub fn router(gate: Arc<EgressGate>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/tools/fetch", post(fetch))
        .route("/tools/fetch/record", post(fetch_record))
        .route("/tools/identity", post(identity))
        .route("/tools/protection-status", post(protection_status))
        .with_state(gate)
}

pub async fn serve(listener: TcpListener, gate: Arc<EgressGate>) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "tool façade listening");
    axum::serve(listener, router(gate)).await
}

async fn fetch(State(gate): State<Arc<EgressGate>>, Json(draft): Json<RequestDraft>) -> String {
    report::render_fetch(&gate.fetch_draft(&draft).await)
}

async fn fetch_record(
    State(gate): State<Arc<EgressGate>>,
    Json(draft): Json<RequestDraft>,
) -> Json<OutcomeRecord> {
    Json(gate.fetch_draft(&draft).await)
}

async fn identity(State(gate): State<Arc<EgressGate>>) -> String {
    report::render_identity(&gate.identity().await)
}

async fn protection_status(State(gate): State<Arc<EgressGate>>) -> String {
    let record = gate.protection_status().await;
    report::render_protection_status(&record, &gate.config().proxy_display(), &gate.stats())
}
