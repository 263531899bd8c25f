//! Lamp discovery across the host's serial ports.
//!
//! Scanning sends the safe `VER` identification query to every plausible
//! port with a short timeout and keeps the ports that answer with the
//! firmware version marker. Wireless (Bluetooth) ports are filtered out
//! up front: probing them is pointless and slow.
//!
//! Do not run a scan during an active session: probe bytes landing on an
//! unrelated instrument at a mismatched baud rate are interpreted as junk
//! commands. Scan once at startup or behind an explicit user action.

#[cfg(feature = "tokio_serial")]
use crate::config::SerialSettings;
#[cfg(feature = "tokio_serial")]
use crate::error::{LampError, Result};
#[cfg(feature = "tokio_serial")]
use crate::lamp::VERSION_MARKER;
#[cfg(feature = "tokio_serial")]
use log::{debug, info};
use serialport::{SerialPortInfo, SerialPortType};
#[cfg(feature = "tokio_serial")]
use std::collections::HashMap;

/// Discovery record for one responding port.
#[derive(Debug, Clone)]
pub struct DiscoveredLamp {
    /// Port identifier (e.g. "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Raw `VER` reply, terminators stripped.
    pub firmware_version: String,
    /// Human-readable port description from the host, when available.
    pub description: Option<String>,
}

/// Scan all serial ports and return the lamps that answered.
///
/// Each port is probed sequentially with `probe_timeout` from the serial
/// settings, so total scan time is bounded by the number of ports. A port
/// that cannot be opened or does not answer is skipped, never fatal; the
/// scan only fails when the host port list itself cannot be read. Probe
/// connections are closed before the next port is opened.
#[cfg(feature = "tokio_serial")]
pub async fn list_candidates(serial: &SerialSettings) -> Result<HashMap<String, DiscoveredLamp>> {
    let ports =
        serialport::available_ports().map_err(|e| LampError::Enumeration(e.to_string()))?;

    let mut found = HashMap::new();
    for port in ports {
        if !is_probe_candidate(&port) {
            debug!("skipping wireless port '{}'", port.port_name);
            continue;
        }

        match probe_port(&port.port_name, serial).await {
            Ok(reply) if reply.contains(VERSION_MARKER) => {
                info!("lamp found on '{}': {}", port.port_name, reply);
                found.insert(
                    port.port_name.clone(),
                    DiscoveredLamp {
                        port_name: port.port_name,
                        firmware_version: reply,
                        description: port_description(&port.port_type),
                    },
                );
            }
            Ok(reply) => {
                debug!(
                    "port '{}' answered without version marker: '{}'",
                    port.port_name, reply
                );
            }
            Err(e) => {
                debug!("port '{}' did not respond to probe: {}", port.port_name, e);
            }
        }
    }

    Ok(found)
}

/// Open a port briefly and issue the identification query.
#[cfg(feature = "tokio_serial")]
async fn probe_port(port_name: &str, serial: &SerialSettings) -> Result<String> {
    use crate::transport::{SerialTransport, Transport};

    let mut transport = SerialTransport::builder(port_name, serial.baud_rate)
        .write_terminator(serial.write_terminator.clone())
        .read_terminator(serial.read_terminator)
        .timeout(serial.probe_timeout)
        .open()?;

    // Transport is dropped (port released) when this returns.
    transport.query("VER").await
}

/// Whether a port is worth probing at all.
///
/// Bluetooth ports are excluded by port type and, for USB bridges, by the
/// product description, since some hosts expose wireless adapters as generic
/// USB serial devices.
fn is_probe_candidate(port: &SerialPortInfo) -> bool {
    match &port.port_type {
        SerialPortType::BluetoothPort => false,
        SerialPortType::UsbPort(usb) => !usb
            .product
            .as_deref()
            .unwrap_or("")
            .contains("Bluetooth"),
        _ => true,
    }
}

fn port_description(port_type: &SerialPortType) -> Option<String> {
    match port_type {
        SerialPortType::UsbPort(usb) => usb.product.clone(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    fn usb_port(name: &str, product: Option<&str>) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x0403,
                pid: 0x6001,
                serial_number: None,
                manufacturer: None,
                product: product.map(str::to_string),
            }),
        }
    }

    #[test]
    fn bluetooth_port_type_is_skipped() {
        let port = SerialPortInfo {
            port_name: "/dev/cu.Bluetooth-Incoming-Port".to_string(),
            port_type: SerialPortType::BluetoothPort,
        };
        assert!(!is_probe_candidate(&port));
    }

    #[test]
    fn usb_port_with_bluetooth_description_is_skipped() {
        // Even a port that would answer the version query is excluded by
        // its description alone.
        let port = usb_port("COM5", Some("Standard Serial over Bluetooth link"));
        assert!(!is_probe_candidate(&port));
    }

    #[test]
    fn plain_usb_serial_bridge_is_probed() {
        let port = usb_port("/dev/ttyUSB0", Some("FT232R USB UART"));
        assert!(is_probe_candidate(&port));
    }

    #[test]
    fn unknown_port_type_is_probed() {
        let port = SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: SerialPortType::Unknown,
        };
        assert!(is_probe_candidate(&port));
    }

    #[test]
    fn description_comes_from_usb_product() {
        let port = usb_port("/dev/ttyUSB0", Some("FT232R USB UART"));
        assert_eq!(
            port_description(&port.port_type).as_deref(),
            Some("FT232R USB UART")
        );
        assert_eq!(port_description(&SerialPortType::Unknown), None);
    }
}
