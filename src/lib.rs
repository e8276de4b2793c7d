//! BLE door remote library
//! Connects to a fixed BLE door peripheral, writes open/close commands to its
//! serial characteristic and reports the text it sends back.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod logging;
pub mod state;

pub use config::AppConfig;
pub use state::AppState;
