//! VISA-style resource address strings.
//!
//! Supported grammar (keywords are case-insensitive, fields are `::`-delimited):
//!
//! - `USB[board]::<vendor id>::<product id>[::<serial>]::INSTR`
//! - `ASRL<port path | N>::INSTR` where a bare number `N` expands to `COMN`
//! - `TCPIP[board]::<host>::<port>::SOCKET`
//! - `SIM::<device type>::INSTR`
//!
//! `TCPIP[board]::<host>[::<lan device>]::INSTR` (VXI-11) is recognized but rejected.
use std::{fmt::Display, str::FromStr};

use crate::error::AddressError;

const FIELD_DELIMITER: &str = "::";
const CLASS_INSTR: &str = "INSTR";
const CLASS_SOCKET: &str = "SOCKET";
const DEFAULT_LAN_DEVICE: &str = "inst0";

/// Message returned for every `TCPIP::INSTR` address.
pub const VXI11_UNSUPPORTED: &str = "VXI-11 (TCPIP INSTR) is not supported. Use SOCKET instead.";

/// The interface family of a resource address.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InterfaceType {
    Usb,
    Serial,
    Tcpip,
    Simulated,
}

impl Display for InterfaceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceType::Usb => write!(f, "USB"),
            InterfaceType::Serial => write!(f, "ASRL"),
            InterfaceType::Tcpip => write!(f, "TCPIP"),
            InterfaceType::Simulated => write!(f, "SIM"),
        }
    }
}

/// A parsed resource address. Immutable once constructed.
///
/// The canonical string form is produced by [`ResourceAddress::build`] (also available
/// through [`Display`]) and is the key used for exclusivity bookkeeping.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum ResourceAddress {
    /// A USB-TMC instrument.
    Usb {
        board: u16,
        vendor_id: u16,
        product_id: u16,
        serial: Option<String>,
    },
    /// A serial port. `port` is the OS path, with `ASRL<N>` normalized to `COM<N>`.
    Serial { board: u16, port: String },
    /// A raw TCP socket connection (`::SOCKET` class).
    TcpSocket { board: u16, host: String, port: u16 },
    /// A VXI-11 instrument (`::INSTR` class). Never produced by [`ResourceAddress::parse`]
    /// and always rejected when a connection is resolved.
    TcpInstr {
        board: u16,
        host: String,
        lan_device: String,
    },
    /// A device registered in a simulated-device registry.
    Simulated { device_type: String },
}

impl ResourceAddress {
    /// Parses a resource string. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<ResourceAddress, AddressError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AddressError::Invalid("resource string is empty".to_string()));
        }
        let fields: Vec<&str> = input.split(FIELD_DELIMITER).collect();
        let head = fields[0];
        let upper = head.to_ascii_uppercase();
        // The matched prefixes are ASCII, so slicing `head` at their length is safe.
        if upper.starts_with("USB") {
            parse_usb(&head[3..], &fields[1..])
        } else if upper.starts_with("ASRL") {
            parse_serial(&head[4..], &fields[1..])
        } else if upper.starts_with("TCPIP") {
            parse_tcpip(&head[5..], &fields[1..])
        } else if upper == "SIM" {
            parse_simulated(&fields[1..])
        } else {
            let prefix: String = upper
                .chars()
                .take_while(|c| c.is_ascii_alphabetic())
                .collect();
            let prefix = if prefix.is_empty() { upper } else { prefix };
            Err(AddressError::UnsupportedInterface(format!(
                "{prefix} resources are not supported"
            )))
        }
    }

    /// Builds the canonical resource string. This is the inverse of [`ResourceAddress::parse`].
    pub fn build(&self) -> String {
        self.to_string()
    }

    /// The interface family of this address.
    pub fn interface_type(&self) -> InterfaceType {
        match self {
            ResourceAddress::Usb { .. } => InterfaceType::Usb,
            ResourceAddress::Serial { .. } => InterfaceType::Serial,
            ResourceAddress::TcpSocket { .. } | ResourceAddress::TcpInstr { .. } => {
                InterfaceType::Tcpip
            }
            ResourceAddress::Simulated { .. } => InterfaceType::Simulated,
        }
    }

    /// The board number, if the interface has one.
    pub fn board(&self) -> Option<u16> {
        match self {
            ResourceAddress::Usb { board, .. }
            | ResourceAddress::Serial { board, .. }
            | ResourceAddress::TcpSocket { board, .. }
            | ResourceAddress::TcpInstr { board, .. } => Some(*board),
            ResourceAddress::Simulated { .. } => None,
        }
    }

    /// The resource class (`INSTR` or `SOCKET`).
    pub fn resource_class(&self) -> &'static str {
        match self {
            ResourceAddress::TcpSocket { .. } => CLASS_SOCKET,
            _ => CLASS_INSTR,
        }
    }
}

impl FromStr for ResourceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceAddress::parse(s)
    }
}

impl Display for ResourceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceAddress::Usb {
                board,
                vendor_id,
                product_id,
                serial,
            } => {
                write!(f, "USB{board}::0x{vendor_id:04X}::0x{product_id:04X}")?;
                if let Some(serial) = serial {
                    write!(f, "::{serial}")?;
                }
                write!(f, "::{CLASS_INSTR}")
            }
            ResourceAddress::Serial { port, .. } => match com_number(port) {
                Some(number) => write!(f, "ASRL{number}::{CLASS_INSTR}"),
                None => write!(f, "ASRL{port}::{CLASS_INSTR}"),
            },
            ResourceAddress::TcpSocket { board, host, port } => {
                write!(f, "TCPIP{board}::{host}::{port}::{CLASS_SOCKET}")
            }
            ResourceAddress::TcpInstr {
                board,
                host,
                lan_device,
            } => write!(f, "TCPIP{board}::{host}::{lan_device}::{CLASS_INSTR}"),
            ResourceAddress::Simulated { device_type } => {
                write!(f, "SIM::{device_type}::{CLASS_INSTR}")
            }
        }
    }
}

/// Returns `N` if `port` is of the form `COM<N>`.
fn com_number(port: &str) -> Option<&str> {
    let prefix = port.get(..3)?;
    let number = &port[3..];
    if prefix.eq_ignore_ascii_case("COM")
        && !number.is_empty()
        && number.bytes().all(|b| b.is_ascii_digit())
    {
        Some(number)
    } else {
        None
    }
}

fn is_class(field: &str, class: &str) -> bool {
    field.trim().eq_ignore_ascii_case(class)
}

fn parse_board(board: &str) -> Result<u16, AddressError> {
    if board.is_empty() {
        return Ok(0);
    }
    board
        .parse::<u16>()
        .map_err(|_| AddressError::Invalid(format!("invalid board number '{board}'")))
}

/// Parses a vendor or product id given as `0x`-prefixed hex or decimal.
fn parse_id(value: &str, what: &str) -> Result<u16, AddressError> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse::<u16>(),
    };
    parsed.map_err(|_| AddressError::Invalid(format!("invalid {what} '{value}'")))
}

fn parse_usb(board: &str, fields: &[&str]) -> Result<ResourceAddress, AddressError> {
    let board = parse_board(board)?;
    let malformed = || {
        AddressError::Invalid(
            "expected USB[board]::<vendor id>::<product id>[::<serial>]::INSTR".to_string(),
        )
    };
    let (class, ids) = fields.split_last().ok_or_else(malformed)?;
    if !is_class(class, CLASS_INSTR) {
        return Err(malformed());
    }
    let (vendor_id, product_id, serial) = match ids {
        [vendor, product] => (vendor, product, None),
        [vendor, product, serial] => {
            if serial.is_empty() {
                return Err(AddressError::Invalid("empty USB serial number".to_string()));
            }
            (vendor, product, Some(serial.to_string()))
        }
        _ => return Err(malformed()),
    };
    Ok(ResourceAddress::Usb {
        board,
        vendor_id: parse_id(vendor_id, "vendor id")?,
        product_id: parse_id(product_id, "product id")?,
        serial,
    })
}

fn parse_serial(path: &str, fields: &[&str]) -> Result<ResourceAddress, AddressError> {
    if path.is_empty() {
        return Err(AddressError::Invalid("missing serial port path".to_string()));
    }
    match fields {
        [class] if is_class(class, CLASS_INSTR) => {}
        _ => {
            return Err(AddressError::Invalid(
                "expected ASRL<port>::INSTR".to_string(),
            ));
        }
    }
    let port = if path.bytes().all(|b| b.is_ascii_digit()) {
        format!("COM{path}")
    } else {
        path.to_string()
    };
    Ok(ResourceAddress::Serial { board: 0, port })
}

fn parse_tcpip(board: &str, fields: &[&str]) -> Result<ResourceAddress, AddressError> {
    let board = parse_board(board)?;
    let Some((class, rest)) = fields.split_last() else {
        return Err(AddressError::Invalid("missing host".to_string()));
    };
    if is_class(class, CLASS_INSTR) {
        return Err(AddressError::UnsupportedInterface(
            VXI11_UNSUPPORTED.to_string(),
        ));
    }
    if !is_class(class, CLASS_SOCKET) {
        return Err(AddressError::Invalid(
            "expected TCPIP[board]::<host>::<port>::SOCKET".to_string(),
        ));
    }
    match rest {
        [host, port] => {
            if host.is_empty() {
                return Err(AddressError::Invalid("missing host".to_string()));
            }
            Ok(ResourceAddress::TcpSocket {
                board,
                host: host.to_string(),
                port: parse_port(port)?,
            })
        }
        [_] => Err(AddressError::Invalid(
            "missing port for TCPIP SOCKET resource".to_string(),
        )),
        _ => Err(AddressError::Invalid(
            "expected TCPIP[board]::<host>::<port>::SOCKET".to_string(),
        )),
    }
}

fn parse_port(port: &str) -> Result<u16, AddressError> {
    let port = port.trim();
    if port.is_empty() {
        return Err(AddressError::Invalid(
            "missing port for TCPIP SOCKET resource".to_string(),
        ));
    }
    let value = port
        .parse::<u32>()
        .map_err(|_| AddressError::Invalid(format!("invalid port '{port}'")))?;
    match u16::try_from(value) {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(AddressError::Invalid(format!(
            "port {port} out of range 1-65535"
        ))),
    }
}

fn parse_simulated(fields: &[&str]) -> Result<ResourceAddress, AddressError> {
    match fields {
        [device_type, class] if is_class(class, CLASS_INSTR) && !device_type.is_empty() => {
            Ok(ResourceAddress::Simulated {
                device_type: device_type.to_string(),
            })
        }
        _ => Err(AddressError::Invalid(
            "expected SIM::<device type>::INSTR".to_string(),
        )),
    }
}

impl ResourceAddress {
    /// Constructs a VXI-11 address with the default LAN device name.
    ///
    /// Such addresses can be built and printed but never opened.
    pub fn tcp_instr(board: u16, host: impl Into<String>) -> ResourceAddress {
        ResourceAddress::TcpInstr {
            board,
            host: host.into(),
            lan_device: DEFAULT_LAN_DEVICE.to_string(),
        }
    }
}
