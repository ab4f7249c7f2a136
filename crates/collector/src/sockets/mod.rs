//! Admin socket discovery and querying.

pub mod admin;
pub mod locator;

pub use admin::AdminSocketClient;
pub use locator::SocketLocator;
