//! Enumeration of instruments attached to this machine.
use async_trait::async_trait;
use scpi_protocol::ResourceAddress;

use crate::error::Result;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SerialPortInfo {
    /// Port path such as `COM3` or `/dev/ttyUSB0`.
    pub path: String,
    pub description: Option<String>,
}

impl SerialPortInfo {
    pub fn new(path: impl Into<String>) -> SerialPortInfo {
        SerialPortInfo {
            path: path.into(),
            description: None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UsbDeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
    pub description: Option<String>,
}

/// One discovered resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceInfo {
    /// Canonical resource string, e.g. `ASRL3::INSTR`.
    pub resource_string: String,
    pub address: ResourceAddress,
    pub description: Option<String>,
}

/// Reports the serial ports and USB instruments present on the system.
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn list_serial_ports(&self) -> Result<Vec<SerialPortInfo>>;

    async fn list_usb_devices(&self) -> Result<Vec<UsbDeviceInfo>>;
}

/// Discovery backed by the operating system.
///
/// Serial ports are enumerated when the `serial` feature is enabled. USB test and
/// measurement devices are never reported since there is no USB backend.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemDiscovery;

#[async_trait]
impl Discovery for SystemDiscovery {
    #[cfg(feature = "serial")]
    async fn list_serial_ports(&self) -> Result<Vec<SerialPortInfo>> {
        let ports = tokio_serial::available_ports()
            .map_err(|e| crate::error::Error::Transport(e.to_string()))?;
        Ok(ports
            .into_iter()
            .map(|port| {
                let description = match port.port_type {
                    tokio_serial::SerialPortType::UsbPort(usb) => usb.product.or(usb.manufacturer),
                    tokio_serial::SerialPortType::BluetoothPort => Some("Bluetooth".to_string()),
                    tokio_serial::SerialPortType::PciPort => Some("PCI".to_string()),
                    tokio_serial::SerialPortType::Unknown => None,
                };
                SerialPortInfo {
                    path: port.port_name,
                    description,
                }
            })
            .collect())
    }

    #[cfg(not(feature = "serial"))]
    async fn list_serial_ports(&self) -> Result<Vec<SerialPortInfo>> {
        log::debug!("Serial discovery requires the 'serial' feature");
        Ok(Vec::new())
    }

    async fn list_usb_devices(&self) -> Result<Vec<UsbDeviceInfo>> {
        Ok(Vec::new())
    }
}

pub(crate) fn serial_resource(port: SerialPortInfo) -> ResourceInfo {
    let address = ResourceAddress::Serial {
        board: 0,
        port: port.path,
    };
    ResourceInfo {
        resource_string: address.build(),
        address,
        description: port.description,
    }
}

pub(crate) fn usb_resource(device: UsbDeviceInfo) -> ResourceInfo {
    let address = ResourceAddress::Usb {
        board: 0,
        vendor_id: device.vendor_id,
        product_id: device.product_id,
        serial: device.serial_number,
    };
    ResourceInfo {
        resource_string: address.build(),
        address,
        description: device.description,
    }
}

pub(crate) fn simulated_resource(device_type: String) -> ResourceInfo {
    let address = ResourceAddress::Simulated { device_type };
    ResourceInfo {
        resource_string: address.build(),
        address,
        description: Some("Simulated device".to_string()),
    }
}
