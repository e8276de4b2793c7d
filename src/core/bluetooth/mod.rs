//! Bluetooth functionality for the door remote
//! This module handles the connection lifecycle, command writes and
//! notifications of the door peripheral.

mod commands;
mod connection;
pub mod constants;
mod error;
mod link;
mod manager;
mod notification;
mod session;
pub mod types;

#[cfg(feature = "radio")]
mod bluest_link;
#[cfg(feature = "radio")]
mod scanner;

// Re-export types that should be publicly accessible
pub use commands::CommandDispatcher;
pub use connection::ConnectionStateMachine;
pub use error::{DispatchError, FailureReason, LinkError};
pub use link::{event_channel, LinkEventReceiver, LinkEventSender, LinkId, LinkMessage, RadioLink};
pub use manager::{BluetoothManager, BluetoothManagerHandle};
pub use notification::{decode_text, NotificationRouter};
pub use session::BleSession;
pub use types::{
    CharacteristicHandle, Command, ConnectionState, DiscoveredService, GattStatus, LinkEvent,
    LinkState, NotificationEvent, WriteMode,
};

#[cfg(feature = "radio")]
pub use bluest_link::BluestLink;
#[cfg(feature = "radio")]
pub use scanner::find_device;
