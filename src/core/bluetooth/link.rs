//! Radio link boundary
//! The platform BLE stack sits behind [`RadioLink`]. Every request returns as
//! soon as it has been issued; its outcome arrives later as a [`LinkMessage`]
//! on the channel created by [`event_channel`]. Messages carry the [`LinkId`]
//! given to `connect`, so the core can tell events of a released link apart
//! from those of the current one.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::constants::EVENT_CHANNEL_CAPACITY;
use crate::core::bluetooth::error::LinkError;
use crate::core::bluetooth::types::{LinkEvent, WriteMode};

/// Identifies one physical link. Assigned by the core on every connect.
pub type LinkId = u64;

/// An adapter event together with the link it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    pub link: LinkId,
    pub event: LinkEvent,
}

impl LinkMessage {
    pub fn new(link: LinkId, event: LinkEvent) -> Self {
        Self { link, event }
    }
}

pub type LinkEventSender = mpsc::Sender<LinkMessage>;
pub type LinkEventReceiver = mpsc::Receiver<LinkMessage>;

/// Creates the channel the adapter uses to deliver its events to the core.
pub fn event_channel() -> (LinkEventSender, LinkEventReceiver) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Outbound primitives of the radio link adapter.
#[async_trait]
pub trait RadioLink: Send + Sync {
    /// Starts connecting to `address`. Every event of the new link is tagged
    /// with `link`. Fails immediately with [`LinkError::RadioUnavailable`] when
    /// the radio is missing or disabled.
    async fn connect(&self, link: LinkId, address: &str) -> Result<(), LinkError>;

    /// Starts service discovery on the connected device.
    async fn discover_services(&self) -> Result<(), LinkError>;

    /// Issues a write of `value` to the characteristic.
    async fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        mode: WriteMode,
    ) -> Result<(), LinkError>;

    /// Issues a read of the characteristic.
    async fn read_characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError>;

    /// Subscribes to change notifications of the characteristic.
    async fn enable_notifications(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError>;

    /// Tears the link down.
    async fn disconnect(&self) -> Result<(), LinkError>;

    /// Releases every resource held for the current link. No event for the
    /// released link is delivered after this returns.
    async fn close(&self);
}
