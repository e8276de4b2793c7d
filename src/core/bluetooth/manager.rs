//! Bluetooth manager for the door remote
//! This module runs the session on a single task. User intents and link
//! events are both delivered over channels, so the session state is only ever
//! touched from here.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::config::link_config::LinkConfig;
use crate::core::bluetooth::constants::EVENT_CHANNEL_CAPACITY;
use crate::core::bluetooth::error::{DispatchError, FailureReason};
use crate::core::bluetooth::link::{LinkEventReceiver, RadioLink};
use crate::core::bluetooth::session::BleSession;
use crate::core::bluetooth::types::{Command, ConnectionState};
use crate::core::sink::{MessageSink, SinkMessage};

enum ManagerCommand {
    Connect,
    Disconnect,
    Send(Command, oneshot::Sender<Result<(), DispatchError>>),
    Read(oneshot::Sender<Result<(), DispatchError>>),
}

/// A clonable handle to the manager task.
#[derive(Clone)]
pub struct BluetoothManagerHandle {
    tx: mpsc::Sender<ManagerCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel_token: CancellationToken,
}

impl BluetoothManagerHandle {
    /// Starts a connection attempt to the configured peripheral.
    pub async fn connect(&self) -> Result<()> {
        self.request(ManagerCommand::Connect).await
    }

    /// Disconnects and releases the link.
    pub async fn disconnect(&self) -> Result<()> {
        self.request(ManagerCommand::Disconnect).await
    }

    pub async fn send(&self, command: Command) -> Result<(), DispatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(ManagerCommand::Send(command, reply_tx)).await.is_err() {
            warn!("Bluetooth manager stopped, command not sent");
            return Err(DispatchError::NotReady);
        }
        reply_rx.await.unwrap_or(Err(DispatchError::NotReady))
    }

    pub async fn open(&self) -> Result<(), DispatchError> {
        self.send(Command::open()).await
    }

    pub async fn close(&self) -> Result<(), DispatchError> {
        self.send(Command::close()).await
    }

    /// Requests a read of the characteristic; the value shows up in the sink.
    pub async fn read(&self) -> Result<(), DispatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(ManagerCommand::Read(reply_tx)).await.is_err() {
            return Err(DispatchError::NotReady);
        }
        reply_rx.await.unwrap_or(Err(DispatchError::NotReady))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Waits until the published state satisfies `predicate`.
    pub async fn wait_for_state<F>(&self, mut predicate: F) -> Result<ConnectionState>
    where
        F: FnMut(ConnectionState) -> bool,
    {
        let mut state_rx = self.state_rx.clone();
        let state = state_rx
            .wait_for(|state| predicate(*state))
            .await
            .map_err(|_| anyhow!("Bluetooth manager stopped"))?;
        Ok(*state)
    }

    /// Stops the manager; the link is released before the task exits.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    async fn request(&self, command: ManagerCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow!("Bluetooth manager stopped"))
    }
}

/// Owns the session and serialises everything that touches it.
pub struct BluetoothManager<L: RadioLink> {
    session: BleSession<L>,
    sink: Arc<dyn MessageSink>,
    link_config: LinkConfig,
    commands: mpsc::Receiver<ManagerCommand>,
    events: LinkEventReceiver,
    state_tx: watch::Sender<ConnectionState>,
    cancel_token: CancellationToken,
    /// Expiry of the pending connect or discovery phase.
    deadline: Option<Instant>,
    /// When the next automatic reconnect fires.
    retry_at: Option<Instant>,
    retries_used: u32,
}

impl<L: RadioLink + 'static> BluetoothManager<L> {
    /// Spawns the manager task.
    pub fn spawn(
        link: Arc<L>,
        events: LinkEventReceiver,
        sink: Arc<dyn MessageSink>,
        config: &AppConfig,
    ) -> (BluetoothManagerHandle, JoinHandle<()>) {
        let (tx, commands) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
        let cancel_token = CancellationToken::new();

        let manager = Self {
            session: BleSession::new(link, sink.clone(), config.peripheral.clone(), &config.link),
            sink,
            link_config: config.link.clone(),
            commands,
            events,
            state_tx,
            cancel_token: cancel_token.clone(),
            deadline: None,
            retry_at: None,
            retries_used: 0,
        };
        let task = tokio::spawn(manager.run());
        info!("Bluetooth manager started.");

        let handle = BluetoothManagerHandle {
            tx,
            state_rx,
            cancel_token,
        };
        (handle, task)
    }

    async fn run(mut self) {
        loop {
            let before = self.session.connection().transitions();
            let deadline = self.deadline;
            let retry_at = self.retry_at;

            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(message) = self.events.recv() => {
                    self.session.on_link_message(message).await;
                }
                _ = sleep_until_opt(deadline) => {
                    self.deadline = None;
                    self.session.on_timeout().await;
                }
                _ = sleep_until_opt(retry_at) => {
                    self.retry_at = None;
                    self.retries_used += 1;
                    info!(
                        "Reconnecting (attempt {}/{})",
                        self.retries_used, self.link_config.reconnect.max_retries
                    );
                    self.sink.append(SinkMessage::note(format!(
                        "Reconnecting (attempt {}/{})...",
                        self.retries_used, self.link_config.reconnect.max_retries
                    )));
                    self.session.connect().await;
                }
            }

            if self.session.connection().transitions() != before {
                self.on_state_changed();
            }
        }

        info!("Bluetooth manager stopping, releasing link.");
        self.session.disconnect().await;
        self.state_tx.send_replace(self.session.state());
    }

    async fn handle_command(&mut self, command: ManagerCommand) {
        match command {
            ManagerCommand::Connect => {
                self.retries_used = 0;
                self.retry_at = None;
                self.session.connect().await;
            }
            ManagerCommand::Disconnect => {
                self.retry_at = None;
                self.session.disconnect().await;
            }
            ManagerCommand::Send(command, reply) => {
                let result = self.session.send(&command).await;
                if reply.send(result).is_err() {
                    debug!("Send caller went away before the reply");
                }
            }
            ManagerCommand::Read(reply) => {
                let result = self.session.request_read().await;
                if reply.send(result).is_err() {
                    debug!("Read caller went away before the reply");
                }
            }
        }
    }

    fn on_state_changed(&mut self) {
        let state = self.session.state();

        self.deadline = self
            .link_config
            .timeout_for(state)
            .and_then(|timeout| after(timeout, "phase timeout"));

        if state == ConnectionState::Ready {
            self.retries_used = 0;
        }
        if self.should_retry(state) {
            self.retry_at = after(self.link_config.reconnect.retry_delay(), "retry delay");
        }

        self.state_tx.send_replace(state);
    }

    fn should_retry(&self, state: ConnectionState) -> bool {
        let unexpected = match state {
            ConnectionState::Failed => true,
            ConnectionState::Disconnected => matches!(
                self.session.connection().last_failure(),
                Some(FailureReason::LinkDropped)
            ),
            _ => false,
        };
        unexpected && self.retries_used < self.link_config.reconnect.max_retries
    }
}

/// `now + delay`, or `None` when the delay is too large to be represented.
fn after(delay: Duration, what: &str) -> Option<Instant> {
    let at = Instant::now().checked_add(delay);
    if at.is_none() {
        warn!("Ignoring {} of {:?}: out of range", what, delay);
    }
    at
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
