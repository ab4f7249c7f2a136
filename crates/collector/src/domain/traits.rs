//! Capability traits the collection cycle is composed from

use std::path::Path;

use async_trait::async_trait;
use error_stack::Report;

use super::error::InventoryError;
use super::error::SocketError;
use super::stats::StatValue;
use super::types::Gauge;
use super::types::InventoryVm;

/// Source of the orchestrator's VM inventory
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Lists every VM known to the orchestrator, on any host
    async fn list_vms(&self) -> Result<Vec<InventoryVm>, Report<InventoryError>>;
}

/// Fetches the raw nested stats exposed by one admin socket
#[async_trait]
pub trait StatsSocketClient: Send + Sync {
    async fn fetch_stats(&self, path: &Path) -> Result<StatValue, Report<SocketError>>;
}

/// Sink for gauge samples
pub trait GaugePublisher: Send + Sync {
    /// Publishes one sample; `timestamp` is milliseconds since the epoch, shared by a cycle
    fn publish(&self, gauge: Gauge, timestamp: i64);
}
