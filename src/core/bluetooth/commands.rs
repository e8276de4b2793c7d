//! Door commands
//! This module turns user intents into characteristic writes.

use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::bluetooth::error::DispatchError;
use crate::core::bluetooth::link::RadioLink;
use crate::core::bluetooth::types::{CharacteristicHandle, Command, GattStatus, WriteMode};
use crate::core::sink::{MessageSink, SinkMessage};

/// Writes commands to the resolved characteristic.
pub struct CommandDispatcher<L: RadioLink> {
    link: Arc<L>,
    sink: Arc<dyn MessageSink>,
    write_mode: WriteMode,
}

impl<L: RadioLink> CommandDispatcher<L> {
    pub fn new(link: Arc<L>, sink: Arc<dyn MessageSink>, write_mode: WriteMode) -> Self {
        Self {
            link,
            sink,
            write_mode,
        }
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Sends `command` through `handle`.
    ///
    /// `handle` is `None` unless the connection is `Ready`; in that case the
    /// command is rejected without touching the radio. Once issued the write is
    /// fire-and-forget: a failure only shows up as a status line.
    pub async fn send(
        &self,
        handle: Option<&CharacteristicHandle>,
        command: &Command,
    ) -> Result<(), DispatchError> {
        let handle = handle.ok_or(DispatchError::NotReady)?;
        let data = command.to_bytes();

        info!("Sending command to door: {:?}", command.intent());
        if let Err(e) = self
            .link
            .write_characteristic(handle.service, handle.characteristic, &data, self.write_mode)
            .await
        {
            warn!("Failed to send command {:?}: {}", command.intent(), e);
            self.sink.append(SinkMessage::note(format!(
                "Failed to send command '{}': {}",
                command.intent(),
                e
            )));
        }
        Ok(())
    }

    /// Asks the peripheral for the current characteristic value. The answer
    /// arrives as a characteristic-read event.
    pub async fn request_read(&self, handle: Option<&CharacteristicHandle>) -> Result<(), DispatchError> {
        let handle = handle.ok_or(DispatchError::NotReady)?;

        debug!("Requesting read of {}", handle.characteristic);
        if let Err(e) = self
            .link
            .read_characteristic(handle.service, handle.characteristic)
            .await
        {
            warn!("Failed to request read: {}", e);
            self.sink
                .append(SinkMessage::note(format!("Failed to read from device: {}", e)));
        }
        Ok(())
    }

    /// Write confirmation from the adapter.
    pub fn on_write_completed(&self, characteristic: Uuid, status: GattStatus) {
        if status.is_success() {
            debug!("Write to {} confirmed", characteristic);
        } else {
            warn!("Write to {} failed with status {}", characteristic, status);
            self.sink.append(SinkMessage::note(format!(
                "Command write failed (status {})",
                status
            )));
        }
    }
}
