//! Serial line settings and baud rate detection.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use scpi_protocol::ResourceAddress;

use crate::{
    error::{Error, Result},
    transport::{TransportConfig, TransportFactory, TransportSettings},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

/// Line settings for `ASRL` resources. Defaults to 9600 8N1 without flow control.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Parameters for probing a serial port at several baud rates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AutoBaudOptions {
    /// Tried in order; the first rate that answers wins.
    pub candidate_baud_rates: Vec<u32>,
    pub probe_command: String,
    pub probe_timeout: Duration,
}

impl Default for AutoBaudOptions {
    fn default() -> Self {
        Self {
            candidate_baud_rates: vec![9600, 19200, 38400, 57600, 115200],
            probe_command: "*IDN?".to_string(),
            probe_timeout: Duration::from_millis(500),
        }
    }
}

/// Detects the baud rate an instrument on a serial port answers at.
#[async_trait]
pub trait BaudProbe: Send + Sync {
    async fn probe(&self, port: &str, options: &AutoBaudOptions, serial: &SerialConfig)
    -> Result<u32>;
}

/// Probes by opening the port through a transport factory at each candidate rate and
/// sending the probe command.
pub struct FactoryBaudProbe {
    factory: Arc<dyn TransportFactory>,
}

impl FactoryBaudProbe {
    pub fn new(factory: Arc<dyn TransportFactory>) -> FactoryBaudProbe {
        FactoryBaudProbe { factory }
    }
}

#[async_trait]
impl BaudProbe for FactoryBaudProbe {
    async fn probe(
        &self,
        port: &str,
        options: &AutoBaudOptions,
        serial: &SerialConfig,
    ) -> Result<u32> {
        for &baud_rate in &options.candidate_baud_rates {
            let config = TransportConfig {
                address: ResourceAddress::Serial {
                    board: 0,
                    port: port.to_string(),
                },
                settings: TransportSettings {
                    timeout: options.probe_timeout,
                    ..TransportSettings::default()
                },
                serial: serial.clone().with_baud_rate(baud_rate),
            };
            let mut transport = self.factory.create(&config)?;
            if let Err(e) = transport.open().await {
                log::debug!("Probe of {} at {} baud failed to open: {}", port, baud_rate, e);
                continue;
            }
            let reply = transport.query(&options.probe_command, None).await;
            if let Err(e) = transport.close().await {
                log::debug!("Closing probe transport for {} failed: {}", port, e);
            }
            match reply {
                Ok(reply) if !reply.trim().is_empty() => {
                    log::debug!("{} answered at {} baud: {}", port, baud_rate, reply.trim());
                    return Ok(baud_rate);
                }
                Ok(_) => log::debug!("{} sent an empty reply at {} baud", port, baud_rate),
                Err(e) => log::debug!("{} did not answer at {} baud: {}", port, baud_rate, e),
            }
        }
        Err(Error::NotFound(format!(
            "no baud rate in {:?} answered '{}' on {}",
            options.candidate_baud_rates, options.probe_command, port
        )))
    }
}
