//! Pod Chaos Monkey
//!
//! Entry point for the `pod-chaos-monkey` binary. Runs one chaos workload
//! until SIGINT or SIGTERM, then lets the current tick finish and exits.

use chaos_monkey::config::{Cli, Command, Config};
use chaos_monkey::models::SelectConfig;
use chaos_monkey::observability::metrics::init_metrics_exporter;
use chaos_monkey::services::{create_client, KubePodClient, PodClientTrait};
use chaos_monkey::tasks::Workload;
use clap::Parser;
use common::config::ObservabilityConfig;
use common::observability::init_tracing;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let Command::Run(args) = cli.command;

    // Initialize tracing before the rest of the configuration is validated
    let env_vars: HashMap<String, String> = std::env::vars().collect();
    let observability = ObservabilityConfig::from_vars(&env_vars)?;
    init_tracing(&observability)?;

    info!("Starting Pod Chaos Monkey");

    let config = Config::load(&args).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        namespace = %config.namespace,
        schedule = %config.schedule,
        label_selector = %config.label_selector,
        self_pod_name = %config.self_pod_name,
        kube_config = %config.kube_config,
        outcome_buffer = config.outcome_buffer,
        api_timeout_ms = config.api_timeout.as_millis() as u64,
        "Configuration loaded successfully"
    );

    if let Some(addr) = config.metrics_bind_address {
        init_metrics_exporter(addr).map_err(|e| {
            error!("Failed to start metrics exporter: {}", e);
            e
        })?;
        info!("Metrics exporter listening on {}", addr);
    }

    let client = create_client(&config.kube_config).await.map_err(|e| {
        error!("Failed to create Kubernetes client: {}", e);
        e
    })?;
    let pod_client: Arc<dyn PodClientTrait> = Arc::new(KubePodClient::new(client));

    let workload = Workload::create(
        config.namespace.clone(),
        &config.schedule,
        config.self_pod_name.clone(),
        SelectConfig::new(config.label_selector.clone()),
        pod_client,
    )
    .map_err(|e| {
        error!("Failed to create workload: {}", e);
        e
    })?
    .with_outcome_buffer(config.outcome_buffer)
    .with_call_timeout(config.api_timeout);

    let cancel_token = CancellationToken::new();
    let mut handle = workload.start(cancel_token.clone());

    // Drain the outcome stream until the scheduler closes it
    let failure_logger = handle.take_failures().map(|mut failures| {
        tokio::spawn(async move {
            while let Some(failure) = failures.recv().await {
                error!(
                    tick = failure.tick,
                    error_kind = failure.kind(),
                    "{}",
                    failure.error
                );
            }
        })
    });

    shutdown_signal().await;
    cancel_token.cancel();

    info!("Waiting for the current tick to finish...");
    if let Err(e) = handle.join().await {
        warn!("Chaos scheduler task ended abnormally: {}", e);
    }
    if let Some(logger) = failure_logger {
        if let Err(e) = logger.await {
            warn!("Failure logger task ended abnormally: {}", e);
        }
    }

    info!("Pod Chaos Monkey shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
