use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::bluetooth::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DISCOVERY_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_MS,
    DEFAULT_SCAN_TIMEOUT_SECS,
};
use crate::core::bluetooth::types::{ConnectionState, WriteMode};

/// Automatic reconnect behaviour. Disabled unless `max_retries` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Number of automatic attempts after a failure or an unexpected drop.
    pub max_retries: u32,
    /// Delay before each automatic attempt, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            max_retries: 0,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Link behaviour settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Write type used for commands.
    pub write_mode: WriteMode,
    /// Upper bound for the connect phase. 0 disables the timeout.
    pub connect_timeout_secs: u64,
    /// Upper bound for service discovery. 0 disables the timeout.
    pub discovery_timeout_secs: u64,
    /// How long to scan for the peripheral before giving up.
    pub scan_timeout_secs: u64,
    /// Subscribe to characteristic notifications once the link is ready.
    pub subscribe_notifications: bool,
    pub reconnect: ReconnectPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            write_mode: WriteMode::WithoutResponse,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            discovery_timeout_secs: DEFAULT_DISCOVERY_TIMEOUT_SECS,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            subscribe_notifications: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl LinkConfig {
    /// Deadline for an attempt sitting in `state`, if that state is bounded.
    pub fn timeout_for(&self, state: ConnectionState) -> Option<Duration> {
        let secs = match state {
            ConnectionState::Connecting => self.connect_timeout_secs,
            ConnectionState::DiscoveringServices => self.discovery_timeout_secs,
            _ => return None,
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_states_have_timeouts() {
        let config = LinkConfig::default();
        assert_eq!(
            config.timeout_for(ConnectionState::Connecting),
            Some(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        );
        assert!(config.timeout_for(ConnectionState::DiscoveringServices).is_some());
        assert_eq!(config.timeout_for(ConnectionState::Ready), None);
        assert_eq!(config.timeout_for(ConnectionState::Idle), None);
    }

    #[test]
    fn zero_disables_timeout() {
        let config = LinkConfig {
            connect_timeout_secs: 0,
            ..LinkConfig::default()
        };
        assert_eq!(config.timeout_for(ConnectionState::Connecting), None);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: LinkConfig =
            serde_json::from_str(r#"{ "write_mode": "with_response", "reconnect": { "max_retries": 3 } }"#)
                .unwrap();
        assert_eq!(config.write_mode, WriteMode::WithResponse);
        assert_eq!(config.reconnect.max_retries, 3);
        assert_eq!(config.reconnect.retry_delay_ms, DEFAULT_RETRY_DELAY_MS);
        assert!(config.subscribe_notifications);
    }

    #[test]
    fn reconnect_is_off_by_default() {
        assert_eq!(LinkConfig::default().reconnect.max_retries, 0);
        assert_eq!(LinkConfig::default().write_mode, WriteMode::WithoutResponse);
    }
}
