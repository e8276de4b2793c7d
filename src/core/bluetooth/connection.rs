//! Connection lifecycle for the door peripheral
//! This module owns the connection state and drives connect, service discovery
//! and teardown from the events reported by the radio link.

use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::config::peripheral_config::PeripheralConfig;
use crate::core::bluetooth::error::FailureReason;
use crate::core::bluetooth::link::{LinkId, RadioLink};
use crate::core::bluetooth::types::{
    CharacteristicHandle, ConnectionState, DiscoveredService, GattStatus, LinkEvent, LinkState,
};
use crate::core::sink::{MessageSink, SinkMessage};

/// State machine for a single logical connection.
pub struct ConnectionStateMachine<L: RadioLink> {
    link: Arc<L>,
    sink: Arc<dyn MessageSink>,
    state: ConnectionState,
    /// Bumped on every transition so observers can tell repeated states apart.
    transitions: u64,
    last_link: LinkId,
    /// The link events are accepted from; `None` once it has been released.
    live_link: Option<LinkId>,
    target: Option<PeripheralConfig>,
    handle: Option<CharacteristicHandle>,
    last_failure: Option<FailureReason>,
    subscribe_notifications: bool,
}

impl<L: RadioLink> ConnectionStateMachine<L> {
    pub fn new(link: Arc<L>, sink: Arc<dyn MessageSink>, subscribe_notifications: bool) -> Self {
        Self {
            link,
            sink,
            state: ConnectionState::Idle,
            transitions: 0,
            last_link: 0,
            live_link: None,
            target: None,
            handle: None,
            last_failure: None,
            subscribe_notifications,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    pub fn live_link(&self) -> Option<LinkId> {
        self.live_link
    }

    /// True when events tagged with `link` belong to the current attempt.
    pub fn is_live(&self, link: LinkId) -> bool {
        self.live_link == Some(link)
    }

    /// The resolved characteristic, available only while `Ready`.
    pub fn handle(&self) -> Option<&CharacteristicHandle> {
        match self.state {
            ConnectionState::Ready => self.handle.as_ref(),
            _ => None,
        }
    }

    /// Why the last attempt ended, `None` after a user-initiated disconnect.
    pub fn last_failure(&self) -> Option<&FailureReason> {
        self.last_failure.as_ref()
    }

    pub fn target(&self) -> Option<&PeripheralConfig> {
        self.target.as_ref()
    }

    /// True when data for `characteristic` belongs to the live link.
    pub fn accepts_data(&self, characteristic: Uuid) -> bool {
        self.handle()
            .map(|handle| handle.characteristic == characteristic)
            .unwrap_or(false)
    }

    /// Starts a new attempt towards `config`.
    ///
    /// Ignored while an attempt is pending or ready; a terminal attempt is
    /// reset to `Idle` first.
    pub async fn connect(&mut self, config: &PeripheralConfig) {
        if self.state.is_pending() || self.state == ConnectionState::Ready {
            info!("Connect requested while {}, ignoring", self.state);
            return;
        }
        if self.state.is_terminal() {
            self.transition(ConnectionState::Idle, "Starting a new connection attempt");
        }

        self.target = Some(config.clone());
        self.handle = None;
        self.last_failure = None;
        self.transition(
            ConnectionState::Connecting,
            format!("Connecting to {}...", config.address()),
        );

        self.last_link += 1;
        self.live_link = Some(self.last_link);
        if let Err(e) = self.link.connect(self.last_link, config.address()).await {
            warn!("Connect request for {} failed: {}", config.address(), e);
            self.fail(e.into()).await;
        }
    }

    /// Releases the link and ends the attempt, whatever the current state.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            debug!("Already disconnected");
            return;
        }

        self.release_link(true).await;
        self.handle = None;
        self.last_failure = None;
        self.transition(ConnectionState::Disconnected, "Disconnected from device");
    }

    /// Expires the pending phase.
    pub async fn on_timeout(&mut self) {
        if self.state.is_pending() {
            warn!("Timed out while {}", self.state);
            self.fail(FailureReason::Timeout(self.state)).await;
        }
    }

    /// Applies a lifecycle event from the radio link.
    pub async fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::ConnectionStateChanged { state, status } => {
                self.on_connection_state_changed(state, status).await
            }
            LinkEvent::ServicesDiscovered { status, services } => {
                self.on_services_discovered(status, services).await
            }
            other => debug!("Not a lifecycle event, ignoring: {:?}", other),
        }
    }

    async fn on_connection_state_changed(&mut self, link_state: LinkState, status: GattStatus) {
        match (self.state, link_state) {
            (ConnectionState::Connecting, LinkState::Connected) => {
                self.transition(ConnectionState::DiscoveringServices, "Connected");
                info!("Connection successful, discovering services...");
                if let Err(e) = self.link.discover_services().await {
                    warn!("Service discovery request failed: {}", e);
                    self.fail(e.into()).await;
                }
            }
            (ConnectionState::Connecting, LinkState::Disconnected) => {
                self.fail(FailureReason::ConnectFailed(format!("link status {}", status)))
                    .await;
            }
            (ConnectionState::DiscoveringServices, LinkState::Disconnected) => {
                self.fail(FailureReason::LinkDropped).await;
            }
            (ConnectionState::Ready, LinkState::Disconnected) => {
                info!("Link dropped with status {}", status);
                self.release_link(false).await;
                self.handle = None;
                self.last_failure = Some(FailureReason::LinkDropped);
                self.transition(ConnectionState::Disconnected, "Disconnected from device");
            }
            (state, link_state) => {
                debug!("Ignoring link {:?} (status {}) while {}", link_state, status, state);
            }
        }
    }

    async fn on_services_discovered(&mut self, status: GattStatus, services: Vec<DiscoveredService>) {
        if self.state != ConnectionState::DiscoveringServices {
            debug!("Ignoring service list while {}", self.state);
            return;
        }
        if !status.is_success() {
            warn!("Service discovery failed with status {}", status);
            self.fail(FailureReason::DiscoveryError(status)).await;
            return;
        }

        let Some(target) = self.target.as_ref() else {
            self.fail(FailureReason::CharacteristicNotFound).await;
            return;
        };
        let service_uuid = target.service_uuid();
        let characteristic_uuid = target.characteristic_uuid();

        for service in &services {
            info!("Available service: {}", service.uuid);
        }

        let found = services
            .iter()
            .filter(|service| service.uuid == service_uuid)
            .any(|service| service.characteristics.contains(&characteristic_uuid));
        if !found {
            warn!(
                "Characteristic {} not found in service {}",
                characteristic_uuid, service_uuid
            );
            self.fail(FailureReason::CharacteristicNotFound).await;
            return;
        }

        info!("Found door characteristic: {}", characteristic_uuid);
        let handle = CharacteristicHandle {
            service: service_uuid,
            characteristic: characteristic_uuid,
        };
        self.handle = Some(handle);
        self.transition(ConnectionState::Ready, "Ready");

        if self.subscribe_notifications {
            if let Err(e) = self
                .link
                .enable_notifications(handle.service, handle.characteristic)
                .await
            {
                warn!("Failed to subscribe to notifications: {}", e);
                self.sink
                    .append(SinkMessage::note(format!("Notifications unavailable: {}", e)));
            }
        }
    }

    async fn fail(&mut self, reason: FailureReason) {
        // An established link is disconnected, not only closed.
        let established = self.state == ConnectionState::DiscoveringServices;
        self.release_link(established).await;
        self.handle = None;
        let text = format!("Connection failed: {}", reason);
        self.last_failure = Some(reason);
        self.transition(ConnectionState::Failed, text);
    }

    async fn release_link(&mut self, disconnect: bool) {
        if let Some(link) = self.live_link.take() {
            debug!("Releasing link #{}", link);
        }
        if disconnect {
            if let Err(e) = self.link.disconnect().await {
                debug!("Disconnect request: {}", e);
            }
        }
        self.link.close().await;
    }

    fn transition(&mut self, next: ConnectionState, status: impl Into<String>) {
        if !self.state.can_transition_to(next) {
            debug!("Rejected transition {} -> {}", self.state, next);
            return;
        }

        info!("Connection state: {} -> {}", self.state, next);
        self.state = next;
        self.transitions += 1;
        self.sink.append(SinkMessage::status(next, status));
    }
}
