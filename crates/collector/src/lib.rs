pub mod app;
pub mod collector;
pub mod config;
pub mod domain;
pub mod inventory;
pub mod logging;
pub mod metrics;
pub mod sockets;
