//! Test adapters implementing the capability traits
//!
//! Used by unit tests and the integration tests under `tests/`.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use error_stack::Report;

use super::error::InventoryError;
use super::error::SocketError;
use super::stats::StatValue;
use super::traits::GaugePublisher;
use super::traits::InventoryClient;
use super::traits::StatsSocketClient;
use super::types::Gauge;
use super::types::InventoryVm;

/// Inventory client serving a fixed VM list
#[derive(Default)]
pub struct MockInventoryClient {
    vms: Mutex<Vec<InventoryVm>>,
    error_mode: Mutex<bool>,
}

impl MockInventoryClient {
    pub fn new(vms: Vec<InventoryVm>) -> Self {
        Self {
            vms: Mutex::new(vms),
            error_mode: Mutex::new(false),
        }
    }

    pub fn set_vms(&self, vms: Vec<InventoryVm>) {
        *self.vms.lock().unwrap_or_else(PoisonError::into_inner) = vms;
    }

    /// Enable or disable error mode for testing error handling
    pub fn set_error_mode(&self, enabled: bool) {
        *self.error_mode.lock().unwrap_or_else(PoisonError::into_inner) = enabled;
    }
}

#[async_trait]
impl InventoryClient for MockInventoryClient {
    async fn list_vms(&self) -> Result<Vec<InventoryVm>, Report<InventoryError>> {
        if *self.error_mode.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(Report::new(InventoryError::Fetch {
                message: "mock inventory failure".to_string(),
            }));
        }
        Ok(self.vms.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// Stats client answering from a path keyed table
///
/// Paths without an entry fail with [`SocketError::Io`].
#[derive(Default)]
pub struct MockStatsSocketClient {
    replies: Mutex<HashMap<PathBuf, StatValue>>,
    requests: Mutex<Vec<PathBuf>>,
}

impl MockStatsSocketClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reply(&self, path: impl Into<PathBuf>, stats: StatValue) {
        self.replies.lock().unwrap_or_else(PoisonError::into_inner).insert(path.into(), stats);
    }

    /// Paths requested so far, in order
    pub fn requests(&self) -> Vec<PathBuf> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl StatsSocketClient for MockStatsSocketClient {
    async fn fetch_stats(&self, path: &Path) -> Result<StatValue, Report<SocketError>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(path.to_path_buf());
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| {
                Report::new(SocketError::Io {
                    message: format!("no mock reply for {}", path.display()),
                })
            })
    }
}

/// Publisher that records every gauge
#[derive(Default)]
pub struct RecordingPublisher {
    gauges: Mutex<Vec<Gauge>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gauges(&self) -> Vec<Gauge> {
        self.gauges.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.gauges.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl GaugePublisher for RecordingPublisher {
    fn publish(&self, gauge: Gauge, _timestamp: i64) {
        self.gauges.lock().unwrap_or_else(PoisonError::into_inner).push(gauge);
    }
}
