//! Constants used throughout the application
//! This module contains the fixed identity of the door peripheral, GATT status
//! codes and the default timing values.

use uuid::Uuid;

/// Default address of the door peripheral (CC2541 / HM-10 module)
pub const DEFAULT_DEVICE_ADDRESS: &str = "00:15:85:14:9C:09";

/// The UUID of the serial service exposed by the door peripheral
pub const UUID_DOOR_SERVICE: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);

/// The UUID of the characteristic used for commands and notifications
pub const UUID_DOOR_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

/// Command byte that opens the door
pub const COMMAND_OPEN: char = 'O';

/// Command byte that closes the door
pub const COMMAND_CLOSE: char = 'F';

/// Separator placed in front of every line handed to the message sink
pub const LINE_SEPARATOR: &str = "\n";

/// GATT operation succeeded
pub const GATT_SUCCESS: u16 = 0x0000;

/// Generic GATT failure reported by the backend when no better code exists
pub const GATT_FAILURE: u16 = 0x0101;

/// Default timeout for the connect phase in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default timeout for service discovery in seconds
pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 10;

/// Default duration of the scan used to locate the peripheral in seconds
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 10;

/// How long the radio may take to report itself available before a connect fails
pub const RADIO_AVAILABLE_TIMEOUT_MS: u64 = 1500;

/// Delay between automatic reconnect attempts in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Capacity of the adapter event and intent channels
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// How often a live link is checked for an unexpected drop
pub const CONNECTION_POLL_INTERVAL_MS: u64 = 1000;
