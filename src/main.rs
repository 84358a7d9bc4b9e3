// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use std::sync::Arc;
use tracing::{info, warn};

use reloader::config::Config;
use reloader::metrics;
use reloader::pause::{self, PauseTimerRegistry};
use reloader::reconcilers::{new_fingerprint_cache, ConfigMapReconciler, SecretReconciler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Reloader operator");

    // Load configuration
    let config = Arc::new(Config::from_env()?);
    info!(
        "Configuration loaded: strategy={:?} auto_reload_all={}",
        config.reload_strategy, config.auto_reload_all
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    metrics::register();

    // Rebuild resume timers for Deployments paused before the last restart
    let timers = Arc::new(PauseTimerRegistry::new());
    if let Err(e) = pause::reconcile_paused_deployments(&client, &timers).await {
        warn!("Failed to reconcile paused deployments at startup: {}", e);
    }

    let cache = new_fingerprint_cache();
    let configmap_reconciler = ConfigMapReconciler::new(
        client.clone(),
        config.clone(),
        timers.clone(),
        cache.clone(),
    );
    let secret_reconciler = SecretReconciler::new(client, config, timers, cache);

    info!("Starting watchers...");

    // Run both watchers concurrently
    tokio::try_join!(configmap_reconciler.run(), secret_reconciler.run())?;

    // This should never be reached as the watchers run forever
    warn!("All watchers stopped unexpectedly");
    Ok(())
}
