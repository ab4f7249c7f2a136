use core::error::Error;

use derive_more::Display;

/// Errors from querying or parsing the orchestrator inventory.
#[derive(Debug, Display)]
pub enum InventoryError {
    #[display("Failed to fetch VM inventory: {message}")]
    Fetch { message: String },
    #[display("Failed to parse VM inventory: {message}")]
    Parse { message: String },
}

impl Error for InventoryError {}

/// Errors from fetching stats over an admin socket.
#[derive(Debug, Display)]
pub enum SocketError {
    #[display("Admin socket I/O failed: {message}")]
    Io { message: String },
    #[display("Admin socket did not answer within {seconds}s")]
    Timeout { seconds: u64 },
    #[display("Failed to decode admin socket reply: {message}")]
    Decode { message: String },
}

impl Error for SocketError {}

/// A collection cycle that produced no data.
#[derive(Debug, Display)]
pub enum CycleError {
    #[display("VM inventory unavailable, skipping cycle")]
    Inventory,
}

impl Error for CycleError {}
