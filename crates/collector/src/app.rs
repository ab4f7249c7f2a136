//! Wires the production collaborators and drives collection cycles.

use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use crate::collector::Collector;
use crate::config::CollectorConfig;
use crate::domain::GaugePublisher;
use crate::domain::InventoryClient;
use crate::domain::StatsSocketClient;
use crate::inventory::OneVmClient;
use crate::metrics::MetricsPublisher;
use crate::sockets::AdminSocketClient;

/// Collector backed by the orchestrator CLI, ceph admin sockets and the metrics file
pub type NodeCollector = Collector<OneVmClient, AdminSocketClient, MetricsPublisher>;

pub fn build_collector(config: &CollectorConfig) -> NodeCollector {
    let inventory = OneVmClient::new(
        config.inventory_command.clone(),
        config.inventory_timeout,
        config.prefix_variable.clone(),
    );
    let stats_client = AdminSocketClient::new(config.socket_timeout);
    let publisher = MetricsPublisher::new(&config.metrics_format, config.host.short.clone());

    Collector::new(config, inventory, stats_client, publisher)
}

/// Runs a cycle every `interval` until `token` is cancelled.
///
/// Cycles never overlap: a cycle outlasting the interval delays the next
/// tick. A failed cycle is logged and retried on the next tick. Returns the
/// number of cycles run.
pub async fn run_collection<I, S, P>(
    collector: &Collector<I, S, P>,
    interval: Duration,
    token: CancellationToken,
) -> usize
where
    I: InventoryClient,
    S: StatsSocketClient,
    P: GaugePublisher,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Starting collection with interval: {:?}", interval);

    let mut cycles = 0;
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Collection shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                cycles += 1;
                if let Err(e) = collector.run_cycle().await {
                    error!(error = ?e, "Collection cycle failed");
                }
            }
        }
    }

    info!(cycles, "Collection stopped");
    cycles
}

/// Resolves once SIGTERM or SIGINT is received.
pub async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::signal;
    use tokio::signal::unix::SignalKind;

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, initiating graceful shutdown");
        }
    }
    Ok(())
}

/// Collects periodically until a shutdown signal arrives.
pub async fn run_daemon(collector: &NodeCollector, interval: Duration) -> Result<()> {
    let token = CancellationToken::new();

    let signal_task = {
        let token = token.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Failed to install signal handlers: {e}");
            }
            token.cancel();
        })
    };

    run_collection(collector, interval, token).await;
    signal_task.abort();
    Ok(())
}
