//! Resolves the VMs running on this host from the orchestrator inventory.

pub mod onevm;

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::config::CollectorConfig;
use crate::config::HostIdentity;
use crate::domain::sanitize;
use crate::domain::InventoryClient;
use crate::domain::InventoryError;
use crate::domain::InventoryVm;
use crate::domain::VmId;
use crate::domain::VmRecord;

pub use onevm::OneVmClient;

/// Filters the inventory down to VMs whose hypervisor process runs locally.
pub struct InventoryResolver<I> {
    client: I,
    host: HostIdentity,
    pid_dir: PathBuf,
    pid_file_prefix: String,
    default_prefix: String,
    max_name_len: usize,
}

impl<I: InventoryClient> InventoryResolver<I> {
    pub fn new(client: I, config: &CollectorConfig) -> Self {
        Self {
            client,
            host: config.host.clone(),
            pid_dir: config.qemu_pid_path.clone(),
            pid_file_prefix: config.pid_file_prefix.clone(),
            default_prefix: config.default_prefix.clone(),
            max_name_len: config.max_metric_name_len,
        }
    }

    pub fn client(&self) -> &I {
        &self.client
    }

    /// Returns the locally running VMs keyed by VM id.
    ///
    /// VMs placed on another host, not yet placed, or without a readable pid
    /// file are left out. Fails only when the inventory itself cannot be
    /// fetched or parsed.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve_local_vms(
        &self,
    ) -> Result<BTreeMap<VmId, VmRecord>, Report<InventoryError>> {
        let inventory = self.client.list_vms().await?;

        let mut vms = BTreeMap::new();
        for vm in inventory {
            if let Some(record) = self.resolve(vm).await {
                vms.insert(record.id.clone(), record);
            }
        }
        Ok(vms)
    }

    async fn resolve(&self, vm: InventoryVm) -> Option<VmRecord> {
        match vm.hostname.as_deref() {
            Some(hostname) if self.host.matches(hostname) => {}
            hostname => {
                debug!(vm_id = %vm.id, ?hostname, "Skipping VM not placed on this host");
                return None;
            }
        }

        let Some(process_id) = self.read_pid(&vm.id).await else {
            debug!(vm_id = %vm.id, "Skipping VM without a running process");
            return None;
        };

        let metric_prefix = match vm.prefix_override.as_deref() {
            Some(prefix) => sanitize(prefix, self.max_name_len),
            None => self.default_prefix.clone(),
        };

        let mut name = sanitize(&vm.name, self.max_name_len);
        if name.is_empty() {
            debug!(vm_id = %vm.id, "VM has no name, using its id");
            name = sanitize(&vm.id, self.max_name_len);
        }

        Some(VmRecord {
            name,
            id: vm.id,
            process_id,
            metric_prefix,
        })
    }

    fn pid_file(&self, vm_id: &str) -> PathBuf {
        self.pid_dir.join(format!("{}-{vm_id}.pid", self.pid_file_prefix))
    }

    /// Reads the VM's pid file; any absence or garbage reads as "not running".
    async fn read_pid(&self, vm_id: &str) -> Option<String> {
        let path = self.pid_file(vm_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            // also covers a pid file removed while the VM shuts down
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(vm_id, path = %path.display(), error = %e, "Failed to read pid file");
                return None;
            }
        };
        parse_pid(&content, &path)
    }
}

fn parse_pid(content: &str, path: &Path) -> Option<String> {
    let pid = content.trim();
    if pid.is_empty() {
        return None;
    }
    if !pid.bytes().all(|b| b.is_ascii_digit()) {
        warn!(path = %path.display(), content = pid, "Ignoring pid file without a decimal pid");
        return None;
    }
    Some(pid.to_string())
}
