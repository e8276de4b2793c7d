//! Application state management
//! This module wires the Bluetooth manager to the message sink and keeps the
//! handles the user controls act on.

use std::sync::Arc;

use log::{error, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::core::bluetooth::{LinkEventReceiver, RadioLink};
use crate::core::sink::{ChannelSink, MessageLog, SinkMessage};
use crate::core::{BluetoothManager, BluetoothManagerHandle};

/// Global application state
pub struct AppState {
    /// Handle to the Bluetooth manager task
    pub bluetooth_manager: BluetoothManagerHandle,
    /// Everything shown to the user so far
    pub message_log: MessageLog,
    manager_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Starts the Bluetooth manager on `link`.
    ///
    /// Sink messages are delivered on the returned receiver; the consumer is
    /// expected to append them to `message_log` and display them.
    pub fn start<L: RadioLink + 'static>(
        link: Arc<L>,
        events: LinkEventReceiver,
        config: &AppConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        info!("Initializing BluetoothManager...");
        let (sink, sink_rx) = ChannelSink::new();
        let (bluetooth_manager, task) = BluetoothManager::spawn(link, events, Arc::new(sink), config);

        let state = Self {
            bluetooth_manager,
            message_log: MessageLog::new(),
            manager_task: Mutex::new(Some(task)),
        };
        (state, sink_rx)
    }

    /// Gets a handle to the Bluetooth manager
    pub fn get_bluetooth_manager(&self) -> BluetoothManagerHandle {
        self.bluetooth_manager.clone()
    }

    /// Stops the manager and waits until the link has been released.
    pub async fn shutdown(&self) {
        self.bluetooth_manager.shutdown();
        if let Some(task) = self.manager_task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Bluetooth manager task ended abnormally: {}", e);
            }
        }
    }
}
