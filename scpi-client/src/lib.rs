//! # SCPI Client
//!
//! An async client library for talking to SCPI test and measurement instruments
//! (oscilloscopes, multimeters, power supplies) over TCP sockets, serial ports and
//! simulated devices.
//!
//! ## Overview
//!
//! Instruments are addressed by VISA-style resource strings such as
//! `TCPIP0::192.168.1.100::5025::SOCKET` or `ASRL3::INSTR`. A [`ResourceManager`] parses
//! the string, picks a transport for the interface and returns a
//! [`MessageBasedResource`], which speaks the instrument's message protocol:
//!
//! - **Text I/O**: `write`, `read` and `query` with configurable terminations
//! - **Binary blocks**: IEEE-488.2 definite and indefinite length blocks, reassembled
//!   across chunked reads and decoded into typed arrays
//! - **ASCII arrays**: separated numeric values with pluggable converters
//! - **Control**: device clear, trigger and status byte
//!
//! Address parsing and the block and array codecs live in the
//! [`scpi_protocol`](https://docs.rs/scpi-protocol/) crate.
//!
//! ## Basic Usage
//!
//! ### Querying an Instrument
//!
//! ```ignore
//! use scpi_client::{OpenOptions, ResourceManager};
//!
//! let manager = ResourceManager::new();
//! let scope = manager
//!     .open_resource("TCPIP0::192.168.1.100::5025::SOCKET", OpenOptions::new())
//!     .await?;
//!
//! println!("Connected to {}", scope.query("*IDN?").await?);
//! ```
//!
//! ### Reading a Waveform
//!
//! ```ignore
//! let format = "h<".parse()?; // little endian i16
//! let samples = scope.query_binary_values("WAV:DATA?", format).await?;
//! ```
//!
//! ### Exclusive Access
//!
//! ```ignore
//! let options = OpenOptions::new().exclusive(true);
//! let psu = manager.open_resource("ASRL3::INSTR", options).await?;
//! // Any further open of ASRL3::INSTR fails until `psu` is closed.
//! psu.close().await?;
//! ```
//!
//! ## Features
//!
//! - `serial`: serial port transport and port discovery through `tokio-serial`
pub mod discovery;
pub mod error;
pub mod manager;
pub mod resource;
pub mod serial;
pub mod sim;
pub mod stream;
pub mod transport;

#[cfg(test)]
mod mock;

pub use discovery::{Discovery, ResourceInfo};
pub use error::{Error, Result};
pub use manager::{OpenOptions, ResourceManager};
pub use resource::{BinaryPayload, MessageBasedResource};
pub use transport::{Transport, TransportConfig, TransportFactory, TransportSettings};
