//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ble_door_remote::config::AppConfig;
use ble_door_remote::core::bluetooth::constants::{UUID_DOOR_CHARACTERISTIC, UUID_DOOR_SERVICE};
use ble_door_remote::core::bluetooth::{
    DiscoveredService, GattStatus, LinkError, LinkEvent, LinkEventSender, LinkId, LinkMessage,
    LinkState, RadioLink, WriteMode,
};
use ble_door_remote::core::{MessageSink, SinkMessage};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCall {
    Connect(String),
    DiscoverServices,
    Write {
        service: Uuid,
        characteristic: Uuid,
        value: Vec<u8>,
        mode: WriteMode,
    },
    Read {
        service: Uuid,
        characteristic: Uuid,
    },
    EnableNotifications {
        service: Uuid,
        characteristic: Uuid,
    },
    Disconnect,
    Close,
}

struct Responder {
    events: LinkEventSender,
    services: Vec<DiscoveredService>,
    answer_connect: bool,
}

/// Records every request; optionally answers connect and discovery requests
/// the way a well-behaved peripheral would.
pub struct MockLink {
    calls: Mutex<Vec<LinkCall>>,
    last_link: Mutex<LinkId>,
    radio_available: bool,
    fail_writes: bool,
    responder: Option<Responder>,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            last_link: Mutex::new(0),
            radio_available: true,
            fail_writes: false,
            responder: None,
        }
    }

    pub fn responding(events: LinkEventSender, services: Vec<DiscoveredService>) -> Self {
        Self {
            responder: Some(Responder {
                events,
                services,
                answer_connect: true,
            }),
            ..Self::new()
        }
    }

    pub fn without_radio(mut self) -> Self {
        self.radio_available = false;
        self
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub fn ignoring_connect(mut self) -> Self {
        if let Some(responder) = self.responder.as_mut() {
            responder.answer_connect = false;
        }
        self
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn connects(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, LinkCall::Connect(_)))
            .count()
    }

    pub fn writes(&self) -> Vec<LinkCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, LinkCall::Write { .. }))
            .collect()
    }

    /// Id of the link most recently asked to connect.
    pub fn last_link(&self) -> LinkId {
        *self.last_link.lock().unwrap()
    }

    fn record(&self, call: LinkCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl RadioLink for MockLink {
    async fn connect(&self, link: LinkId, address: &str) -> Result<(), LinkError> {
        self.record(LinkCall::Connect(address.to_string()));
        *self.last_link.lock().unwrap() = link;
        if !self.radio_available {
            return Err(LinkError::RadioUnavailable);
        }
        if let Some(responder) = &self.responder {
            if responder.answer_connect {
                let _ = responder
                    .events
                    .send(LinkMessage::new(
                        link,
                        LinkEvent::ConnectionStateChanged {
                            state: LinkState::Connected,
                            status: GattStatus::SUCCESS,
                        },
                    ))
                    .await;
            }
        }
        Ok(())
    }

    async fn discover_services(&self) -> Result<(), LinkError> {
        self.record(LinkCall::DiscoverServices);
        if let Some(responder) = &self.responder {
            let _ = responder
                .events
                .send(LinkMessage::new(
                    self.last_link(),
                    LinkEvent::ServicesDiscovered {
                        status: GattStatus::SUCCESS,
                        services: responder.services.clone(),
                    },
                ))
                .await;
        }
        Ok(())
    }

    async fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        mode: WriteMode,
    ) -> Result<(), LinkError> {
        self.record(LinkCall::Write {
            service,
            characteristic,
            value: value.to_vec(),
            mode,
        });
        if self.fail_writes {
            return Err(LinkError::Backend("write rejected".to_string()));
        }
        Ok(())
    }

    async fn read_characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError> {
        self.record(LinkCall::Read {
            service,
            characteristic,
        });
        Ok(())
    }

    async fn enable_notifications(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError> {
        self.record(LinkCall::EnableNotifications {
            service,
            characteristic,
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.record(LinkCall::Disconnect);
        Ok(())
    }

    async fn close(&self) {
        self.record(LinkCall::Close);
    }
}

/// Keeps every message handed to the sink.
#[derive(Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<SinkMessage>>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<SinkMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.messages()
            .iter()
            .filter(|message| matches!(message, SinkMessage::Status { .. }))
            .map(|message| message.text().to_string())
            .collect()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.messages()
            .iter()
            .filter(|message| matches!(message, SinkMessage::Notification(_)))
            .map(|message| message.text().to_string())
            .collect()
    }
}

impl MessageSink for RecordingSink {
    fn append(&self, message: SinkMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

/// The door service exposing the door characteristic.
pub fn door_services() -> Vec<DiscoveredService> {
    vec![
        DiscoveredService::new(
            Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb),
            vec![Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb)],
        ),
        DiscoveredService::new(UUID_DOOR_SERVICE, vec![UUID_DOOR_CHARACTERISTIC]),
    ]
}

/// The door service without the door characteristic.
pub fn services_without_door_characteristic() -> Vec<DiscoveredService> {
    vec![DiscoveredService::new(
        UUID_DOOR_SERVICE,
        vec![Uuid::from_u128(0x0000ffe2_0000_1000_8000_00805f9b34fb)],
    )]
}

pub fn test_config() -> AppConfig {
    AppConfig::default()
}
