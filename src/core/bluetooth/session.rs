//! A connection to the door peripheral together with its command and
//! notification paths. Link events are dispatched by kind: lifecycle events go
//! to the state machine, data to the router, write confirmations to the
//! dispatcher.

use std::sync::Arc;

use log::{debug, warn};

use crate::config::link_config::LinkConfig;
use crate::config::peripheral_config::PeripheralConfig;
use crate::core::bluetooth::commands::CommandDispatcher;
use crate::core::bluetooth::connection::ConnectionStateMachine;
use crate::core::bluetooth::error::DispatchError;
use crate::core::bluetooth::link::{LinkMessage, RadioLink};
use crate::core::bluetooth::notification::NotificationRouter;
use crate::core::bluetooth::types::{Command, ConnectionState, LinkEvent};
use crate::core::sink::{MessageSink, SinkMessage};

pub struct BleSession<L: RadioLink> {
    peripheral: PeripheralConfig,
    connection: ConnectionStateMachine<L>,
    dispatcher: CommandDispatcher<L>,
    router: NotificationRouter,
    sink: Arc<dyn MessageSink>,
}

impl<L: RadioLink> BleSession<L> {
    pub fn new(
        link: Arc<L>,
        sink: Arc<dyn MessageSink>,
        peripheral: PeripheralConfig,
        link_config: &LinkConfig,
    ) -> Self {
        Self {
            peripheral,
            connection: ConnectionStateMachine::new(
                link.clone(),
                sink.clone(),
                link_config.subscribe_notifications,
            ),
            dispatcher: CommandDispatcher::new(link, sink.clone(), link_config.write_mode),
            router: NotificationRouter::new(sink.clone()),
            sink,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionStateMachine<L> {
        &self.connection
    }

    pub fn peripheral(&self) -> &PeripheralConfig {
        &self.peripheral
    }

    pub async fn connect(&mut self) {
        self.connection.connect(&self.peripheral).await;
    }

    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await;
    }

    pub async fn send(&self, command: &Command) -> Result<(), DispatchError> {
        self.dispatcher.send(self.connection.handle(), command).await
    }

    pub async fn request_read(&self) -> Result<(), DispatchError> {
        self.dispatcher.request_read(self.connection.handle()).await
    }

    pub async fn on_timeout(&mut self) {
        self.connection.on_timeout().await;
    }

    /// Applies a message from the adapter. Messages of a released link are
    /// dropped, whatever they carry.
    pub async fn on_link_message(&mut self, message: LinkMessage) {
        if !self.connection.is_live(message.link) {
            debug!(
                "Dropping event of released link #{} while {}: {:?}",
                message.link,
                self.state(),
                message.event
            );
            return;
        }
        self.on_link_event(message.event).await;
    }

    pub async fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::CharacteristicChanged {
                characteristic,
                data,
            } => {
                if self.connection.accepts_data(characteristic) {
                    self.router.on_characteristic_data(&data);
                } else {
                    debug!("Dropping notification from {} while {}", characteristic, self.state());
                }
            }
            LinkEvent::CharacteristicRead {
                characteristic,
                status,
                data,
            } => {
                if !self.connection.accepts_data(characteristic) {
                    debug!("Dropping read result from {} while {}", characteristic, self.state());
                } else if status.is_success() {
                    self.router.on_characteristic_data(&data);
                } else {
                    warn!("Read of {} failed with status {}", characteristic, status);
                    self.sink
                        .append(SinkMessage::note(format!("Read failed (status {})", status)));
                }
            }
            LinkEvent::WriteCompleted {
                characteristic,
                status,
            } => self.dispatcher.on_write_completed(characteristic, status),
            lifecycle => self.connection.on_link_event(lifecycle).await,
        }
    }
}
