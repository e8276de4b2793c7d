//! [`RadioLink`] over the platform BLE stack, using `bluest`.
//! Every request spawns a task that reports its outcome on the event channel.
//! All tasks of a link share one [`LinkScope`]: its token is cancelled on
//! disconnect/close and its id tags every event the tasks report.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::time::{interval, timeout};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::constants::{CONNECTION_POLL_INTERVAL_MS, RADIO_AVAILABLE_TIMEOUT_MS};
use crate::core::bluetooth::error::LinkError;
use crate::core::bluetooth::link::{LinkEventSender, LinkId, LinkMessage, RadioLink};
use crate::core::bluetooth::scanner;
use crate::core::bluetooth::types::{
    DiscoveredService, GattStatus, LinkEvent, LinkState, WriteMode,
};

/// Handles of the currently connected device.
struct ActiveLink {
    device: Device,
    characteristics: HashMap<(Uuid, Uuid), Characteristic>,
}

/// Cancellation and event tagging shared by the tasks of one link.
#[derive(Clone)]
struct LinkScope {
    link: LinkId,
    token: CancellationToken,
    events: LinkEventSender,
}

impl LinkScope {
    /// Delivers `event` unless the link has been released.
    async fn emit(&self, event: LinkEvent) {
        if self.token.is_cancelled() {
            debug!("Dropping event of released link #{}: {:?}", self.link, event);
            return;
        }
        if self.events.send(LinkMessage::new(self.link, event)).await.is_err() {
            debug!("Link event receiver dropped");
        }
    }
}

pub struct BluestLink {
    adapter: Option<Adapter>,
    events: LinkEventSender,
    scan_timeout: Duration,
    active: Arc<Mutex<Option<ActiveLink>>>,
    scope: StdMutex<LinkScope>,
}

impl BluestLink {
    /// Opens the default adapter. A missing adapter is not an error here; the
    /// first connect reports it as `RadioUnavailable`.
    pub async fn new(events: LinkEventSender, scan_timeout: Duration) -> Self {
        let adapter = Adapter::default().await;
        if adapter.is_none() {
            warn!("No Bluetooth adapter found");
        }
        Self {
            adapter,
            scan_timeout,
            active: Arc::new(Mutex::new(None)),
            scope: StdMutex::new(LinkScope {
                link: 0,
                token: CancellationToken::new(),
                events: events.clone(),
            }),
            events,
        }
    }

    /// Cancels every task of the previous link and opens a scope for `link`.
    fn renew_scope(&self, link: LinkId) -> LinkScope {
        let mut guard = self.scope.lock().unwrap_or_else(|p| p.into_inner());
        guard.token.cancel();
        *guard = LinkScope {
            link,
            token: CancellationToken::new(),
            events: self.events.clone(),
        };
        guard.clone()
    }

    fn current_scope(&self) -> LinkScope {
        self.scope.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn cancel_tasks(&self) {
        self.scope.lock().unwrap_or_else(|p| p.into_inner()).token.cancel();
    }

    /// Disconnects `device` at the adapter if it is still connected.
    async fn disconnect_device(&self, device: &Device) -> Result<(), LinkError> {
        if !device.is_connected().await {
            info!("Device {} not connected", device.id());
            return Ok(());
        }
        info!("Disconnecting from device {}", device.id());
        let adapter = self.adapter.as_ref().ok_or(LinkError::RadioUnavailable)?;
        adapter
            .disconnect_device(device)
            .await
            .map_err(|e| LinkError::Backend(e.to_string()))?;
        info!("Successfully disconnected");
        Ok(())
    }

    async fn available_adapter(&self) -> Result<Adapter, LinkError> {
        let adapter = self.adapter.clone().ok_or(LinkError::RadioUnavailable)?;
        match timeout(
            Duration::from_millis(RADIO_AVAILABLE_TIMEOUT_MS),
            adapter.wait_available(),
        )
        .await
        {
            Ok(Ok(())) => Ok(adapter),
            Ok(Err(e)) => {
                warn!("Bluetooth adapter not available: {}", e);
                Err(LinkError::RadioUnavailable)
            }
            Err(_) => {
                warn!("Bluetooth adapter did not become available in time");
                Err(LinkError::RadioUnavailable)
            }
        }
    }

    async fn active_device(&self) -> Result<Device, LinkError> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| active.device.clone())
            .ok_or(LinkError::NotConnected)
    }

    async fn characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<Characteristic, LinkError> {
        let guard = self.active.lock().await;
        let active = guard.as_ref().ok_or(LinkError::NotConnected)?;
        active
            .characteristics
            .get(&(service, characteristic))
            .cloned()
            .ok_or(LinkError::CharacteristicUnavailable(characteristic))
    }

    async fn establish(adapter: &Adapter, address: &str, scan_timeout: Duration) -> Result<Device, LinkError> {
        let device = scanner::find_device(adapter, address, scan_timeout).await?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Device details - ID: {}, Name: {:?}", device.id(), name);

        if !device.is_connected().await {
            info!("Initiating connection to {}...", device.id());
            adapter
                .connect_device(&device)
                .await
                .map_err(|e| LinkError::Backend(e.to_string()))?;
        }
        Ok(device)
    }

    async fn discover(device: &Device) -> Result<Vec<(Uuid, Vec<Characteristic>)>, bluest::Error> {
        let mut found = Vec::new();
        for service in device.discover_services().await? {
            let characteristics = service.discover_characteristics().await?;
            found.push((service.uuid(), characteristics));
        }
        Ok(found)
    }

    /// Reports an unexpected drop of `device` as a link disconnect.
    fn spawn_connection_watch(device: Device, scope: LinkScope) {
        tokio::spawn(async move {
            let mut poll = interval(Duration::from_millis(CONNECTION_POLL_INTERVAL_MS));
            loop {
                tokio::select! {
                    _ = scope.token.cancelled() => break,
                    _ = poll.tick() => {
                        if !device.is_connected().await {
                            info!("Device {} disconnected", device.id());
                            scope.emit(LinkEvent::ConnectionStateChanged {
                                state: LinkState::Disconnected,
                                status: GattStatus::SUCCESS,
                            }).await;
                            break;
                        }
                    }
                }
            }
        });
    }
}

#[async_trait]
impl RadioLink for BluestLink {
    async fn connect(&self, link: LinkId, address: &str) -> Result<(), LinkError> {
        let adapter = self.available_adapter().await?;
        let scope = self.renew_scope(link);
        let active = self.active.clone();
        let address = address.to_string();
        let scan_timeout = self.scan_timeout;

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = scope.token.cancelled() => {
                    debug!("Connect to {} cancelled", address);
                    return;
                }
                result = Self::establish(&adapter, &address, scan_timeout) => result,
            };

            match result {
                Ok(device) => {
                    {
                        // close() cancels before taking the lock, so a
                        // cancelled scope here means the link was released.
                        let mut guard = active.lock().await;
                        if scope.token.is_cancelled() {
                            drop(guard);
                            info!("Link #{} released while connecting, disconnecting", scope.link);
                            if let Err(e) = adapter.disconnect_device(&device).await {
                                warn!("Failed to disconnect released device: {}", e);
                            }
                            return;
                        }
                        *guard = Some(ActiveLink {
                            device: device.clone(),
                            characteristics: HashMap::new(),
                        });
                    }
                    Self::spawn_connection_watch(device, scope.clone());
                    scope
                        .emit(LinkEvent::ConnectionStateChanged {
                            state: LinkState::Connected,
                            status: GattStatus::SUCCESS,
                        })
                        .await;
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", address, e);
                    scope
                        .emit(LinkEvent::ConnectionStateChanged {
                            state: LinkState::Disconnected,
                            status: GattStatus::FAILURE,
                        })
                        .await;
                }
            }
        });
        Ok(())
    }

    async fn discover_services(&self) -> Result<(), LinkError> {
        let device = self.active_device().await?;
        let scope = self.current_scope();
        let active = self.active.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = scope.token.cancelled() => return,
                result = Self::discover(&device) => result,
            };

            let event = match result {
                Ok(found) => {
                    let mut services = Vec::with_capacity(found.len());
                    let mut characteristics = HashMap::new();
                    for (service_uuid, service_characteristics) in found {
                        let mut uuids = Vec::with_capacity(service_characteristics.len());
                        for characteristic in service_characteristics {
                            uuids.push(characteristic.uuid());
                            characteristics.insert((service_uuid, characteristic.uuid()), characteristic);
                        }
                        services.push(DiscoveredService::new(service_uuid, uuids));
                    }
                    if let Some(active) = active.lock().await.as_mut() {
                        active.characteristics = characteristics;
                    }
                    LinkEvent::ServicesDiscovered {
                        status: GattStatus::SUCCESS,
                        services,
                    }
                }
                Err(e) => {
                    error!("Service discovery failed: {}", e);
                    LinkEvent::ServicesDiscovered {
                        status: GattStatus::FAILURE,
                        services: Vec::new(),
                    }
                }
            };
            scope.emit(event).await;
        });
        Ok(())
    }

    async fn write_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
        mode: WriteMode,
    ) -> Result<(), LinkError> {
        let write_char = self.characteristic(service, characteristic).await?;
        let scope = self.current_scope();
        let data = value.to_vec();

        tokio::spawn(async move {
            let result = match mode {
                WriteMode::WithResponse => write_char.write(&data).await,
                WriteMode::WithoutResponse => write_char.write_without_response(&data).await,
            };
            let status = match result {
                Ok(()) => GattStatus::SUCCESS,
                Err(e) => {
                    warn!("Write to {} failed: {}", characteristic, e);
                    GattStatus::FAILURE
                }
            };
            scope.emit(LinkEvent::WriteCompleted { characteristic, status }).await;
        });
        Ok(())
    }

    async fn read_characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError> {
        let read_char = self.characteristic(service, characteristic).await?;
        let scope = self.current_scope();

        tokio::spawn(async move {
            let event = match read_char.read().await {
                Ok(data) => LinkEvent::CharacteristicRead {
                    characteristic,
                    status: GattStatus::SUCCESS,
                    data,
                },
                Err(e) => {
                    warn!("Read of {} failed: {}", characteristic, e);
                    LinkEvent::CharacteristicRead {
                        characteristic,
                        status: GattStatus::FAILURE,
                        data: Vec::new(),
                    }
                }
            };
            scope.emit(event).await;
        });
        Ok(())
    }

    async fn enable_notifications(&self, service: Uuid, characteristic: Uuid) -> Result<(), LinkError> {
        let notify_char = self.characteristic(service, characteristic).await?;
        let scope = self.current_scope();

        info!("Subscribing to notifications...");
        tokio::spawn(async move {
            let mut notification_stream = match notify_char.notify().await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to subscribe to notifications: {}", e);
                    return;
                }
            };
            info!("Listening for door notifications...");

            loop {
                tokio::select! {
                    _ = scope.token.cancelled() => break,
                    result = notification_stream.next() => match result {
                        Some(Ok(data)) => {
                            debug!("Received door data: {:?}", data);
                            scope.emit(LinkEvent::CharacteristicChanged { characteristic, data }).await;
                        }
                        Some(Err(e)) => {
                            error!("Error in notification stream: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
            }
            info!("Notification stream ended");
        });
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.cancel_tasks();
        let Some(active) = self.active.lock().await.take() else {
            return Err(LinkError::NotConnected);
        };
        self.disconnect_device(&active.device).await
    }

    async fn close(&self) {
        self.cancel_tasks();
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        if let Err(e) = self.disconnect_device(&active.device).await {
            warn!("Failed to disconnect while closing the link: {}", e);
        }
        info!("Link closed, device and characteristic handles released.");
    }
}
