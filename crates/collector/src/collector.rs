//! One collection cycle: join local VMs to their admin sockets and publish
//! per-device gauges.

use error_stack::Report;
use error_stack::ResultExt;
use regex::Regex;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::config::CollectorConfig;
use crate::domain::CycleError;
use crate::domain::CycleReport;
use crate::domain::Gauge;
use crate::domain::GaugePublisher;
use crate::domain::InventoryClient;
use crate::domain::SocketRecord;
use crate::domain::StatValue;
use crate::domain::StatsSocketClient;
use crate::domain::VmRecord;
use crate::inventory::InventoryResolver;
use crate::metrics::current_time;
use crate::sockets::SocketLocator;

/// Correlates VMs with admin sockets and publishes their stats.
pub struct Collector<I, S, P> {
    resolver: InventoryResolver<I>,
    locator: SocketLocator,
    stats_client: S,
    publisher: P,
    device_regex: Regex,
}

impl<I, S, P> Collector<I, S, P>
where
    I: InventoryClient,
    S: StatsSocketClient,
    P: GaugePublisher,
{
    pub fn new(config: &CollectorConfig, inventory: I, stats_client: S, publisher: P) -> Self {
        Self {
            resolver: InventoryResolver::new(inventory, config),
            locator: SocketLocator::new(config),
            stats_client,
            publisher,
            device_regex: config.device_regex.clone(),
        }
    }

    pub fn inventory(&self) -> &I {
        self.resolver.client()
    }

    pub fn stats_client(&self) -> &S {
        &self.stats_client
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Runs one full collection pass.
    ///
    /// Finding no VMs or no sockets is a valid, empty cycle. A socket that
    /// cannot be queried only loses its own gauges. Fails only when the
    /// inventory is unavailable, in which case nothing is published.
    #[instrument(level = "debug", skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleReport, Report<CycleError>> {
        let vms = self
            .resolver
            .resolve_local_vms()
            .await
            .change_context(CycleError::Inventory)?;
        let sockets = self.locator.locate_sockets();
        let timestamp = current_time();

        let mut report = CycleReport {
            vms: vms.len(),
            sockets: sockets.len(),
            ..CycleReport::default()
        };

        for vm in vms.values() {
            debug!(vm_id = %vm.id, pid = %vm.process_id, "Checking VM");
            if vm.process_id.is_empty() {
                continue;
            }

            for socket in sockets.iter().filter(|s| s.process_id == vm.process_id) {
                report.matched_sockets += 1;
                match self.collect_socket(vm, socket, timestamp).await {
                    Some(published) => report.gauges += published,
                    None => report.failed_sockets += 1,
                }
            }
        }

        info!(
            vms = report.vms,
            sockets = report.sockets,
            matched_sockets = report.matched_sockets,
            failed_sockets = report.failed_sockets,
            gauges = report.gauges,
            "Collection cycle finished"
        );
        Ok(report)
    }

    /// Publishes the device stats of one socket, returning how many gauges
    /// were published or `None` if the socket could not be queried.
    async fn collect_socket(
        &self,
        vm: &VmRecord,
        socket: &SocketRecord,
        timestamp: i64,
    ) -> Option<usize> {
        let stats = match self.stats_client.fetch_stats(&socket.path).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(
                    vm_id = %vm.id,
                    path = %socket.path.display(),
                    error = ?e,
                    "Failed to fetch admin socket stats"
                );
                return None;
            }
        };

        let gauges = device_gauges(vm, &stats, &self.device_regex);
        let published = gauges.len();
        for gauge in gauges {
            self.publisher.publish(gauge, timestamp);
        }
        debug!(
            vm_id = %vm.id,
            client_id = %socket.client_id,
            gauges = published,
            "Published socket stats"
        );
        Some(published)
    }
}

/// Extracts the device identifier of a stat group: capture group 1 of `device_regex`.
pub fn device_id<'k>(group: &'k str, device_regex: &Regex) -> Option<&'k str> {
    device_regex
        .captures(group)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .filter(|id| !id.is_empty())
}

/// Builds the gauges of every device group in `stats`.
///
/// Groups whose key is not a device, and scalar groups, are skipped.
pub fn device_gauges(vm: &VmRecord, stats: &StatValue, device_regex: &Regex) -> Vec<Gauge> {
    let Some(groups) = stats.groups() else {
        return Vec::new();
    };

    let mut gauges = Vec::new();
    for (group, values) in groups {
        let Some(device) = device_id(group, device_regex) else {
            continue;
        };
        if values.groups().is_none() {
            continue;
        }

        let prefix = format!("{}.{}.{}", vm.metric_prefix, vm.name, device);
        gauges.extend(values.flatten(&prefix).into_iter().map(|leaf| Gauge {
            name: leaf.name,
            value: leaf.value,
            instance: vm.id.clone(),
        }));
    }
    gauges
}
