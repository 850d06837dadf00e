//! # SCPI Protocol Library
//!
//! I/O-free building blocks for talking to SCPI test instruments (oscilloscopes,
//! power supplies, multimeters, electronic loads).
//!
//! ## Overview
//!
//! - [`address`]: parse, build and match VISA-style resource strings such as
//!   `USB0::0x1AB1::0x04CE::DS1ZA123::INSTR` or `TCPIP0::10.0.0.5::5025::SOCKET`
//! - [`block`]: IEEE-488.2 arbitrary block headers (`#<N><length><data>` and `#0<data>\n`)
//! - [`datatype`]: typed binary arrays (`b`, `H<`, `f`, `d<`, ...)
//! - [`ascii`]: separated ASCII numeric arrays
//! - `codec` (feature `tokio`): a `tokio_util` codec for termination-delimited messages
//!
//! ## Basic Usage
//!
//! ### Resource Addresses
//!
//! ```
//! use scpi_protocol::{ResourceAddress, matches_pattern};
//!
//! let address = ResourceAddress::parse("usb::0x1ab1::0x04ce::DS1ZA123::instr").unwrap();
//! assert_eq!(address.build(), "USB0::0x1AB1::0x04CE::DS1ZA123::INSTR");
//! assert!(matches_pattern(&address.build(), "USB?*::INSTR"));
//! ```
//!
//! ### Binary Blocks
//!
//! ```
//! use scpi_protocol::block::{BlockHeader, encode_block};
//! use scpi_protocol::BinaryFormat;
//!
//! let format: BinaryFormat = "h<".parse().unwrap();
//! let block = encode_block(&format.encode(&[1.0, -2.0]));
//! assert_eq!(&block[..3], b"#14");
//!
//! let header = BlockHeader::parse(&block).unwrap();
//! let payload = &block[header.header_len()..header.total_len()];
//! assert_eq!(format.decode(payload), vec![1.0, -2.0]);
//! ```
//!
//! ### ASCII Arrays
//!
//! ```
//! use scpi_protocol::ascii::{Separator, parse_values};
//!
//! assert_eq!(parse_values("1.5, 2, x, 3", &Separator::Default), vec![1.5, 2.0, 3.0]);
//! ```
//!
//! ## Thread Safety
//!
//! All types are plain values and can be shared across threads.

pub mod address;
pub mod ascii;
pub mod block;
#[cfg(feature = "tokio")]
pub mod codec;
pub mod datatype;
pub mod error;
pub mod pattern;

pub use address::{InterfaceType, ResourceAddress};
pub use datatype::{BinaryFormat, ElementType, Endianness};
pub use pattern::{ResourcePattern, matches_pattern};
