//! Applicant verification service. Binary entrypoint.
//! Boots the Axum HTTP server with the judgment client, store and coordinator.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use applicant_verifier::config::AppConfig;
use applicant_verifier::metrics::Metrics;
use applicant_verifier::{
    build_client, router, telemetry, Coordinator, CoordinatorSettings, MemoryStore, Pipeline,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let judge = build_client(&config.judgment)?;
    info!(provider = judge.provider_name(), "judgment client ready");

    let pipeline = Pipeline::new(judge, config.pipeline.high_risk_threshold);
    let coordinator = Coordinator::new(
        Arc::new(MemoryStore::new()),
        pipeline,
        CoordinatorSettings::from(&config.pipeline),
    );

    let mut app = router(coordinator);
    match Metrics::init() {
        Ok(metrics) => app = app.merge(metrics.router()),
        Err(e) => warn!(error = %e, "metrics endpoint disabled"),
    }

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
