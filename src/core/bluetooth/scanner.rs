//! Locates the door peripheral by its fixed address.

use std::time::Duration;

use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, info};
use tokio::time::sleep;

use crate::config::peripheral_config::extract_mac_address;
use crate::core::bluetooth::error::LinkError;

/// Finds the device whose identifier carries `address`.
///
/// Already connected devices are checked first; otherwise the adapter scans
/// until the device shows up or `scan_timeout` elapses.
pub async fn find_device(adapter: &Adapter, address: &str, scan_timeout: Duration) -> Result<Device, LinkError> {
    info!("Checking for connected devices");
    let connected_devices = adapter
        .connected_devices()
        .await
        .map_err(|e| LinkError::Backend(e.to_string()))?;
    if let Some(device) = connected_devices
        .into_iter()
        .find(|device| has_address(device, address))
    {
        info!("Door peripheral {} is already connected", address);
        return Ok(device);
    }

    info!("Starting bluetooth scan for {}", address);
    let mut scan_stream = adapter
        .scan(&[])
        .await
        .map_err(|e| LinkError::Backend(e.to_string()))?;
    let scan_deadline = sleep(scan_timeout);
    tokio::pin!(scan_deadline);

    loop {
        tokio::select! {
            result = scan_stream.next() => {
                match result {
                    Some(discovered_device) => {
                        debug!(
                            "Found device - Device: {:?}, RSSI: {:?}",
                            discovered_device.device, discovered_device.rssi
                        );
                        if has_address(&discovered_device.device, address) {
                            info!("Found door peripheral {}", address);
                            return Ok(discovered_device.device);
                        }
                    }
                    None => {
                        info!("Bluetooth scan stream has ended.");
                        break;
                    }
                }
            }
            _ = &mut scan_deadline => {
                info!("Scan for {} timed out after {:?}", address, scan_timeout);
                break;
            }
        }
    }

    Err(LinkError::DeviceNotFound(address.to_string()))
}

fn has_address(device: &Device, address: &str) -> bool {
    extract_mac_address(&device.id().to_string())
        .map(|mac| mac == address)
        .unwrap_or(false)
}
