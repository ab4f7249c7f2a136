//! Records produced and consumed during one collection cycle.

use std::path::PathBuf;

/// Orchestrator-assigned VM identifier.
pub type VmId = String;

/// One VM entry exactly as reported by the orchestrator inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryVm {
    pub id: VmId,
    pub name: String,
    /// Execution host, absent while the VM is pending or undeployed
    pub hostname: Option<String>,
    /// Metric prefix override taken from the VM template
    pub prefix_override: Option<String>,
}

/// A VM running on this host, resolved for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRecord {
    pub id: VmId,
    /// Pid of the hypervisor process backing the VM
    pub process_id: String,
    /// Metric-safe VM name
    pub name: String,
    /// Metric-safe leading namespace segment
    pub metric_prefix: String,
}

/// An admin socket found on disk, keyed by its owning process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketRecord {
    pub path: PathBuf,
    pub process_id: String,
    /// Distinguishes several client connections of the same process
    pub client_id: String,
}

/// A flattened numeric leaf of a stats payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StatLeaf {
    pub name: String,
    pub value: f64,
}

/// A gauge sample handed to the publisher.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauge {
    pub name: String,
    pub value: f64,
    /// VM id, kept apart from the name so identically named device metrics stay distinguishable
    pub instance: VmId,
}

/// Summary of one collection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub vms: usize,
    pub sockets: usize,
    pub matched_sockets: usize,
    pub failed_sockets: usize,
    pub gauges: usize,
}
