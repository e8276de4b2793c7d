//! Message sink boundary
//! The display surface lives outside the core. The core hands it status lines
//! and decoded notifications through [`MessageSink`]; adapters decide where they go.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::warn;
use tokio::sync::mpsc;

use crate::core::bluetooth::constants::LINE_SEPARATOR;
use crate::core::bluetooth::types::{ConnectionState, NotificationEvent};

/// One entry for the message sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkMessage {
    /// Lifecycle or error status, e.g. "Disconnected from device".
    Status {
        state: Option<ConnectionState>,
        text: String,
    },
    /// Text received from the peripheral.
    Notification(NotificationEvent),
}

impl SinkMessage {
    pub fn status(state: ConnectionState, text: impl Into<String>) -> Self {
        SinkMessage::Status {
            state: Some(state),
            text: text.into(),
        }
    }

    /// A status line that is not tied to a state change.
    pub fn note(text: impl Into<String>) -> Self {
        SinkMessage::Status {
            state: None,
            text: text.into(),
        }
    }

    pub fn notification(text: String) -> Self {
        SinkMessage::Notification(NotificationEvent {
            text,
            received_at: Instant::now(),
        })
    }

    pub fn text(&self) -> &str {
        match self {
            SinkMessage::Status { text, .. } => text,
            SinkMessage::Notification(event) => &event.text,
        }
    }

    /// The text as appended to the display, prefixed with the line separator.
    pub fn line(&self) -> String {
        format!("{}{}", LINE_SEPARATOR, self.text())
    }
}

/// Append-only consumer of status lines and notifications.
pub trait MessageSink: Send + Sync {
    fn append(&self, message: SinkMessage);
}

/// Forwards every message over an unbounded channel so the consumer can run
/// on its own task or thread.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn append(&self, message: SinkMessage) {
        if let Err(e) = self.tx.send(message) {
            warn!("Message sink consumer is gone, dropping: {:?}", e.0.text());
        }
    }
}

/// In-memory text log, the equivalent of the message view.
#[derive(Clone, Default)]
pub struct MessageLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every line (the "clear" control).
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn lines(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Everything appended so far, exactly as displayed.
    pub fn contents(&self) -> String {
        self.lock().concat()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MessageSink for MessageLog {
    fn append(&self, message: SinkMessage) {
        self.lock().push(message.line());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_lines_in_order_and_clears() {
        let log = MessageLog::new();
        log.append(SinkMessage::note("Connected"));
        log.append(SinkMessage::notification("door open".to_string()));

        assert_eq!(log.lines(), vec!["\nConnected", "\ndoor open"]);
        assert_eq!(log.contents(), "\nConnected\ndoor open");

        log.clear();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn channel_sink_delivers_to_receiver() {
        let (sink, mut rx) = ChannelSink::new();
        sink.append(SinkMessage::status(ConnectionState::Ready, "Ready"));

        let message = rx.recv().await.unwrap();
        assert_eq!(message.text(), "Ready");
        assert!(matches!(
            message,
            SinkMessage::Status {
                state: Some(ConnectionState::Ready),
                ..
            }
        ));
    }
}
