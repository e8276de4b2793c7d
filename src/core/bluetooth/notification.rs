//! Notification handling for the door peripheral
//! This module decodes data pushed by (or read from) the peripheral and hands
//! it to the message sink.

use std::sync::Arc;

use log::{debug, warn};

use crate::core::sink::{MessageSink, SinkMessage};

/// Routes characteristic data to the message sink as text lines.
#[derive(Clone)]
pub struct NotificationRouter {
    sink: Arc<dyn MessageSink>,
}

impl NotificationRouter {
    pub fn new(sink: Arc<dyn MessageSink>) -> Self {
        Self { sink }
    }

    /// Handles data from a solicited read or an unsolicited notification.
    /// Each call produces exactly one line, in call order.
    pub fn on_characteristic_data(&self, data: &[u8]) {
        let message = decode_text(data);
        debug!("Received door message: {:?}", message);
        self.sink.append(SinkMessage::notification(message));
    }
}

/// Decodes a payload as UTF-8. Invalid sequences are replaced rather than
/// rejected; the peripheral is expected to send text.
pub fn decode_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_owned(),
        Err(e) => {
            warn!(
                "Non-text payload of {} bytes (invalid after byte {}): {:02x?}",
                data.len(),
                e.valid_up_to(),
                data
            );
            String::from_utf8_lossy(data).into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sink::MessageLog;

    #[test]
    fn text_payload_becomes_one_line() {
        let log = MessageLog::new();
        let router = NotificationRouter::new(Arc::new(log.clone()));

        router.on_characteristic_data(b"Porte ouverte");

        assert_eq!(log.lines(), vec!["\nPorte ouverte"]);
    }

    #[test]
    fn lines_keep_delivery_order() {
        let log = MessageLog::new();
        let router = NotificationRouter::new(Arc::new(log.clone()));

        for message in ["1", "2", "2", "3"] {
            router.on_characteristic_data(message.as_bytes());
        }

        assert_eq!(log.lines(), vec!["\n1", "\n2", "\n2", "\n3"]);
    }

    #[test]
    fn binary_payload_is_decoded_lossily() {
        assert_eq!(decode_text(&[b'o', b'k', 0xff]), "ok\u{fffd}");
        assert_eq!(decode_text(&[]), "");
    }
}
