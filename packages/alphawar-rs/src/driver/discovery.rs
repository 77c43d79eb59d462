// Serial device discovery
//
// Matches enumerated serial ports against a vendor/product allow-list. Only
// metadata is inspected; no port is opened.

use super::{DeviceInfo, DriverError, UsbId};
use tokio_serial::SerialPortType;

/// Enumerated port, reduced to the fields discovery looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub port: String,
    pub usb_id: Option<UsbId>,
    pub serial_number: Option<String>,
    pub description: Option<String>,
}

/// Keep the candidates whose USB id is allow-listed, in enumeration order
pub fn filter_compatible(
    candidates: impl IntoIterator<Item = PortCandidate>,
    allowlist: &[UsbId],
) -> Vec<DeviceInfo> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let usb_id = candidate.usb_id?;
            if !allowlist.contains(&usb_id) {
                return None;
            }
            log::info!(
                "Compatible device found: {} (serial: {}, description: {})",
                candidate.port,
                candidate.serial_number.as_deref().unwrap_or("N/A"),
                candidate.description.as_deref().unwrap_or("N/A")
            );
            Some(DeviceInfo {
                port: candidate.port,
                usb_id,
                serial_number: candidate.serial_number,
                description: candidate.description,
            })
        })
        .collect()
}

/// Enumerate the host's serial ports and keep the allow-listed ones
pub fn scan_serial_ports(allowlist: &[UsbId]) -> Result<Vec<DeviceInfo>, DriverError> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| DriverError::Enumeration(e.to_string()))?;
    log::debug!("Enumerated {} serial ports", ports.len());

    let candidates = ports.into_iter().map(|info| match info.port_type {
        SerialPortType::UsbPort(usb) => PortCandidate {
            port: info.port_name,
            usb_id: Some(UsbId::new(usb.vid, usb.pid)),
            serial_number: usb.serial_number,
            description: usb.product,
        },
        _ => PortCandidate {
            port: info.port_name,
            usb_id: None,
            serial_number: None,
            description: None,
        },
    });

    Ok(filter_compatible(candidates, allowlist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::OPENBCI_ALLOWLIST;

    fn usb(port: &str, vid: u16, pid: u16) -> PortCandidate {
        PortCandidate {
            port: port.to_string(),
            usb_id: Some(UsbId::new(vid, pid)),
            serial_number: Some(format!("SN-{}", port)),
            description: Some("FT231X USB UART".to_string()),
        }
    }

    #[test]
    fn test_filter_keeps_allowlisted_in_order() {
        let candidates = vec![
            usb("COM3", 0x2341, 0x0043),
            usb("COM7", 0x0403, 0x6015),
            PortCandidate {
                port: "COM1".to_string(),
                usb_id: None,
                serial_number: None,
                description: None,
            },
            usb("COM9", 0x04D8, 0xF372),
        ];

        let found = filter_compatible(candidates, &OPENBCI_ALLOWLIST);
        let ports: Vec<&str> = found.iter().map(|d| d.port.as_str()).collect();
        assert_eq!(ports, vec!["COM7", "COM9"]);
        assert_eq!(found[0].serial_number.as_deref(), Some("SN-COM7"));
    }

    #[test]
    fn test_filter_empty_allowlist_matches_nothing() {
        let found = filter_compatible(vec![usb("COM7", 0x0403, 0x6015)], &[]);
        assert!(found.is_empty());
    }
}
