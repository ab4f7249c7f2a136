use clap::Args;
use clap::Parser;
use clap::Subcommand;
use utils::version;

use super::collector::CollectorArgs;

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect ceph stats of local VMs periodically
    Daemon(Box<DaemonArgs>),
    /// Run a single collection cycle and exit
    Collect(Box<CollectorArgs>),
}

#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    #[command(flatten)]
    pub collector: CollectorArgs,

    #[arg(
        long,
        env = "COLLECT_INTERVAL_SECS",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between the start of two collection cycles"
    )]
    pub interval_secs: u64,
}
