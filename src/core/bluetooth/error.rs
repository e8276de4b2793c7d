//! Error types for the bluetooth core.

use thiserror::Error;
use uuid::Uuid;

use crate::core::bluetooth::types::{ConnectionState, GattStatus};

/// Why a command was not dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The link is not `Ready` or the characteristic has not been resolved.
    #[error("not connected to the door peripheral")]
    NotReady,
    /// The intent cannot be encoded as a single ASCII byte.
    #[error("command {0:?} is not a single ASCII character")]
    InvalidCommand(char),
}

/// Errors raised by a [`RadioLink`](crate::core::bluetooth::RadioLink) when a
/// request cannot even be issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("radio unavailable")]
    RadioUnavailable,
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("no active link")]
    NotConnected,
    #[error("characteristic {0} unavailable")]
    CharacteristicUnavailable(Uuid),
    #[error("bluetooth backend error: {0}")]
    Backend(String),
}

/// Reason a connection attempt ended in `Failed` or an unexpected `Disconnected`.
///
/// The `Display` output is the status text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("radio unavailable")]
    RadioUnavailable,
    #[error("{0}")]
    ConnectFailed(String),
    #[error("timed out while {0}")]
    Timeout(ConnectionState),
    #[error("characteristic not found")]
    CharacteristicNotFound,
    #[error("characteristic not found (discovery status {0})")]
    DiscoveryError(GattStatus),
    #[error("link dropped")]
    LinkDropped,
}

impl From<LinkError> for FailureReason {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::RadioUnavailable => FailureReason::RadioUnavailable,
            other => FailureReason::ConnectFailed(other.to_string()),
        }
    }
}
