//! Library entry point assembled by `main.rs`. Mirrors `autopilot::lib.rs`'s
//! split between "parse args, build the world, run until signalled to
//! stop" and the bin crate's thin `#[tokio::main]` wrapper.

pub mod api;
pub mod cli;
pub mod domain;
pub mod errors;
pub mod infra;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::oneshot;

use crate::domain::RuntimeContext;
use crate::infra::config::RuntimeConfig;
use crate::infra::enclave_device::GramineEnclaveDevice;
use crate::infra::hasher::Blake2Hasher;
use crate::infra::signer::Ed25519Signer;

/// Parse CLI args, build the runtime context, and serve the notarization API
/// and the metrics endpoint until a shutdown signal arrives.
pub async fn run() {
    let args = cli::Args::parse();

    let config = RuntimeConfig::load_embedded().expect("embedded config asset is malformed");
    init_tracing(&config.log_level);
    tracing::info!(%args, "starting oracle-notary");

    let ctx = RuntimeContext::new(
        Arc::new(config),
        Arc::new(GramineEnclaveDevice::gramine()),
        Arc::new(Blake2Hasher),
        Arc::new(Ed25519Signer::generate()),
        infra::http_client::build_client(),
    );

    let (api_shutdown_tx, api_shutdown_rx) = oneshot::channel();
    let (metrics_shutdown_tx, metrics_shutdown_rx) = oneshot::channel();

    let api = tokio::spawn(api::serve(args.bind_addr, api::router(ctx), api_shutdown_rx));
    let metrics = tokio::spawn(api::serve(args.metrics_addr, api::metrics_router(), metrics_shutdown_rx));

    tokio::signal::ctrl_c().await.ok();
    tracing::info!("received shutdown signal");
    let _ = api_shutdown_tx.send(());
    let _ = metrics_shutdown_tx.send(());

    match api.await {
        Ok(Err(err)) => tracing::error!(?err, "api server exited with an error"),
        Err(err) => tracing::error!(?err, "api server task panicked"),
        Ok(Ok(())) => (),
    }
    match metrics.await {
        Ok(Err(err)) => tracing::error!(?err, "metrics server exited with an error"),
        Err(err) => tracing::error!(?err, "metrics server task panicked"),
        Ok(Ok(())) => (),
    }
}

fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().json().with_env_filter(filter).init();
}
