use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use nebula_ceph::app;
use nebula_ceph::config::Cli;
use nebula_ceph::config::CollectorArgs;
use nebula_ceph::config::CollectorConfig;
use nebula_ceph::config::Commands;
use nebula_ceph::config::DaemonArgs;
use nebula_ceph::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon(daemon_args) => run_daemon(*daemon_args).await,
        Commands::Collect(collector_args) => run_collect(*collector_args).await,
    }
}

fn load_config(args: &CollectorArgs) -> Result<CollectorConfig> {
    CollectorConfig::from_args(args).map_err(|report| anyhow::anyhow!("{report:?}"))
}

async fn run_daemon(daemon_args: DaemonArgs) -> Result<()> {
    let _guard = logging::init(&daemon_args.collector.metrics_file);

    tracing::info!("Starting nebula-ceph daemon {}", &**version::VERSION);

    let config = load_config(&daemon_args.collector)?;
    tracing::info!(
        host = %config.host.short,
        fqdn = %config.host.fqdn,
        socket_dir = %config.socket_dir.display(),
        "Loaded configuration"
    );

    let collector = app::build_collector(&config);
    app::run_daemon(&collector, Duration::from_secs(daemon_args.interval_secs)).await?;

    tracing::info!("nebula-ceph daemon stopped");
    Ok(())
}

async fn run_collect(collector_args: CollectorArgs) -> Result<()> {
    let _guard = logging::init(&collector_args.metrics_file);

    let config = load_config(&collector_args)?;
    let collector = app::build_collector(&config);

    let report = collector
        .run_cycle()
        .await
        .map_err(|report| anyhow::anyhow!("{report:?}"))?;
    tracing::info!(gauges = report.gauges, "Collection finished");
    Ok(())
}
