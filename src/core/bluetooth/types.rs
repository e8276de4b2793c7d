//! Defines shared data structures for the Bluetooth module.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{COMMAND_CLOSE, COMMAND_OPEN, GATT_FAILURE, GATT_SUCCESS};
use crate::core::bluetooth::error::DispatchError;

/// Lifecycle of a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    DiscoveringServices,
    Ready,
    Disconnected,
    Failed,
}

impl ConnectionState {
    /// Returns true if moving from `self` to `next` keeps the attempt monotonic.
    ///
    /// A new attempt may only start (`Idle`) from a terminal state, and
    /// `disconnect()` may end an attempt from any state.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Idle, Connecting) => true,
            (Connecting, DiscoveringServices | Failed) => true,
            (DiscoveringServices, Ready | Failed) => true,
            (Disconnected | Failed, Idle) => true,
            (from, Disconnected) => from != Disconnected,
            _ => false,
        }
    }

    /// Terminal states end the current attempt.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }

    /// States in which an attempt is still making progress towards `Ready`.
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::DiscoveringServices
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::DiscoveringServices => "discovering services",
            ConnectionState::Ready => "ready",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Raw GATT status code as reported by the radio backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GattStatus(pub u16);

impl GattStatus {
    pub const SUCCESS: GattStatus = GattStatus(GATT_SUCCESS);
    pub const FAILURE: GattStatus = GattStatus(GATT_FAILURE);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// Link-level state reported by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// How a command is written to the characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Fire-and-forget write command (ATT Write Command).
    #[default]
    WithoutResponse,
    /// Acknowledged write request (ATT Write Request).
    WithResponse,
}

/// A service found during discovery, with the UUIDs of its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub uuid: Uuid,
    pub characteristics: Vec<Uuid>,
}

impl DiscoveredService {
    pub fn new(uuid: Uuid, characteristics: Vec<Uuid>) -> Self {
        Self { uuid, characteristics }
    }
}

/// Events delivered by the radio link adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    ConnectionStateChanged {
        state: LinkState,
        status: GattStatus,
    },
    ServicesDiscovered {
        status: GattStatus,
        services: Vec<DiscoveredService>,
    },
    CharacteristicRead {
        characteristic: Uuid,
        status: GattStatus,
        data: Vec<u8>,
    },
    CharacteristicChanged {
        characteristic: Uuid,
        data: Vec<u8>,
    },
    /// Write confirmation for a previously issued write request.
    WriteCompleted {
        characteristic: Uuid,
        status: GattStatus,
    },
}

/// The resolved service/characteristic pair the session talks to.
///
/// Created by the connection state machine when discovery succeeds and dropped
/// when the attempt ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicHandle {
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// A single-character intent plus optional payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    intent: u8,
    payload: Vec<u8>,
}

impl Command {
    /// Builds a command from any ASCII character.
    pub fn new(intent: char) -> Result<Self, DispatchError> {
        Self::with_payload(intent, Vec::new())
    }

    pub fn with_payload(intent: char, payload: Vec<u8>) -> Result<Self, DispatchError> {
        if !intent.is_ascii() {
            return Err(DispatchError::InvalidCommand(intent));
        }
        Ok(Self {
            intent: intent as u8,
            payload,
        })
    }

    /// Opens the door ('O')
    pub fn open() -> Self {
        Self {
            intent: COMMAND_OPEN as u8,
            payload: Vec::new(),
        }
    }

    /// Closes the door ('F')
    pub fn close() -> Self {
        Self {
            intent: COMMAND_CLOSE as u8,
            payload: Vec::new(),
        }
    }

    pub fn intent(&self) -> char {
        char::from(self.intent)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Wire form: the intent byte followed by the payload, no framing.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.payload.len());
        bytes.push(self.intent);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Text received from the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub text: String,
    pub received_at: Instant,
}
