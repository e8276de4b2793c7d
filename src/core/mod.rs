//! Core functionality for the door remote
//! This module contains the BLE session logic and the message sink boundary.

pub mod bluetooth;
pub mod sink;

// Re-export commonly used types
pub use bluetooth::{BluetoothManager, BluetoothManagerHandle};
pub use sink::{ChannelSink, MessageLog, MessageSink, SinkMessage};
