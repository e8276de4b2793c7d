use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    DEFAULT_DEVICE_ADDRESS, UUID_DOOR_CHARACTERISTIC, UUID_DOOR_SERVICE,
};

const MAC_PATTERN: &str = r"([0-9A-Fa-f]{2}[:_-]){5}([0-9A-Fa-f]{2})";

static MAC_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MAC_PATTERN).expect("MAC pattern is valid"));
static EXACT_MAC_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{}$", MAC_PATTERN)).expect("MAC pattern is valid"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid device address {0:?}, expected six hex pairs like 00:15:85:14:9C:09")]
    InvalidAddress(String),
}

/// Identity of the door peripheral. Built once at start-up and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPeripheralConfig")]
pub struct PeripheralConfig {
    address: String,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawPeripheralConfig {
    address: String,
    service_uuid: Uuid,
    characteristic_uuid: Uuid,
}

impl Default for RawPeripheralConfig {
    fn default() -> Self {
        RawPeripheralConfig {
            address: DEFAULT_DEVICE_ADDRESS.to_string(),
            service_uuid: UUID_DOOR_SERVICE,
            characteristic_uuid: UUID_DOOR_CHARACTERISTIC,
        }
    }
}

impl TryFrom<RawPeripheralConfig> for PeripheralConfig {
    type Error = ConfigError;

    fn try_from(raw: RawPeripheralConfig) -> Result<Self, Self::Error> {
        Self::new(&raw.address, raw.service_uuid, raw.characteristic_uuid)
    }
}

impl PeripheralConfig {
    /// Validates `address` and normalises it to upper case with `:` separators.
    pub fn new(address: &str, service_uuid: Uuid, characteristic_uuid: Uuid) -> Result<Self, ConfigError> {
        let trimmed = address.trim();
        if !EXACT_MAC_ADDRESS.is_match(trimmed) {
            return Err(ConfigError::InvalidAddress(address.to_string()));
        }

        Ok(Self {
            address: normalize_address(trimmed),
            service_uuid,
            characteristic_uuid,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn service_uuid(&self) -> Uuid {
        self.service_uuid
    }

    pub fn characteristic_uuid(&self) -> Uuid {
        self.characteristic_uuid
    }
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        PeripheralConfig {
            address: DEFAULT_DEVICE_ADDRESS.to_string(),
            service_uuid: UUID_DOOR_SERVICE,
            characteristic_uuid: UUID_DOOR_CHARACTERISTIC,
        }
    }
}

/// Pulls the last MAC-like address out of a platform device identifier.
pub fn extract_mac_address(device_id: &str) -> Option<String> {
    MAC_ADDRESS
        .find_iter(device_id)
        .last()
        .map(|m| normalize_address(m.as_str()))
}

fn normalize_address(address: &str) -> String {
    address.replace(['-', '_'], ":").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_normalised() {
        let config = PeripheralConfig::new("00-15-85-14-9c-09", UUID_DOOR_SERVICE, UUID_DOOR_CHARACTERISTIC).unwrap();
        assert_eq!(config.address(), DEFAULT_DEVICE_ADDRESS);
    }

    #[test]
    fn malformed_address_is_rejected() {
        for address in ["", "00:15:85:14:9C", "00:15:85:14:9C:09:11", "zz:15:85:14:9C:09"] {
            assert!(
                matches!(
                    PeripheralConfig::new(address, UUID_DOOR_SERVICE, UUID_DOOR_CHARACTERISTIC),
                    Err(ConfigError::InvalidAddress(_))
                ),
                "{address:?}"
            );
        }
    }

    #[test]
    fn deserialisation_validates_address() {
        let json = r#"{
            "address": "not-a-mac",
            "service_uuid": "0000ffe0-0000-1000-8000-00805f9b34fb",
            "characteristic_uuid": "0000ffe1-0000-1000-8000-00805f9b34fb"
        }"#;
        assert!(serde_json::from_str::<PeripheralConfig>(json).is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_the_door_defaults() {
        let config: PeripheralConfig = serde_json::from_str(r#"{ "address": "aa:bb:cc:dd:ee:ff" }"#).unwrap();
        assert_eq!(config.address(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(config.characteristic_uuid(), UUID_DOOR_CHARACTERISTIC);
    }

    #[test]
    fn default_targets_the_serial_characteristic() {
        let config = PeripheralConfig::default();
        assert_eq!(
            config.characteristic_uuid().to_string(),
            "0000ffe1-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            config.service_uuid().to_string(),
            "0000ffe0-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn mac_is_extracted_from_platform_ids() {
        assert_eq!(
            extract_mac_address("/org/bluez/hci0/dev_00_15_85_14_9C_09"),
            Some("00:15:85:14:9C:09".to_string())
        );
        assert_eq!(extract_mac_address("hci0"), None);
        assert_eq!(
            extract_mac_address("BluetoothLE#BluetoothLEe0:d4:64:aa:bb:cc-00:15:85:14:9c:09"),
            Some("00:15:85:14:9C:09".to_string())
        );
    }

    #[test]
    fn shared_patterns_serve_repeated_lookups() {
        for _ in 0..3 {
            assert_eq!(
                extract_mac_address("dev_AA_BB_CC_DD_EE_FF"),
                Some("AA:BB:CC:DD:EE:FF".to_string())
            );
            assert!(PeripheralConfig::new(" aa:bb:cc:dd:ee:ff ", UUID_DOOR_SERVICE, UUID_DOOR_CHARACTERISTIC).is_ok());
        }
        assert!(MAC_ADDRESS.is_match("xx 00:15:85:14:9C:09 yy"));
        assert!(!EXACT_MAC_ADDRESS.is_match("xx 00:15:85:14:9C:09 yy"));
    }
}
