//! The byte channel contract that concrete interface bindings implement.
use std::time::Duration;

use async_trait::async_trait;
use scpi_protocol::ResourceAddress;

use crate::{
    error::{Error, Result},
    serial::SerialConfig,
};

/// Mutable configuration owned by every transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportSettings {
    pub timeout: Duration,
    pub read_termination: String,
    pub write_termination: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            read_termination: "\n".to_string(),
            write_termination: "\n".to_string(),
        }
    }
}

/// A stateful byte channel to one instrument.
///
/// A transport starts closed. Every I/O method called while closed fails with
/// [`Error::NotOpen`]. Timeouts are enforced by the transport itself; callers add none.
///
/// Termination handling belongs here: [`Transport::write`] appends the write termination
/// and [`Transport::read`] strips the read termination. The raw methods never touch
/// terminations.
#[async_trait]
pub trait Transport: Send {
    fn is_open(&self) -> bool;

    async fn open(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    /// Sends one text message followed by the write termination.
    async fn write(&mut self, message: &str) -> Result<()>;

    /// Reads one text message up to the read termination.
    async fn read(&mut self) -> Result<String>;

    /// Writes `message`, waits `delay` if given, then reads the reply.
    async fn query(&mut self, message: &str, delay: Option<Duration>) -> Result<String> {
        self.write(message).await?;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.read().await
    }

    /// Writes `data` as-is and returns the number of bytes written.
    async fn write_raw(&mut self, data: &[u8]) -> Result<usize>;

    /// Returns between 1 and `max_bytes` bytes, whatever is available first.
    async fn read_raw(&mut self, max_bytes: usize) -> Result<Vec<u8>>;

    /// Returns exactly `count` bytes, waiting until they are available or the timeout elapses.
    async fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>>;

    /// Clears the device and discards pending input.
    async fn clear(&mut self) -> Result<()>;

    async fn trigger(&mut self) -> Result<()> {
        self.write("*TRG").await
    }

    /// Reads the IEEE-488.2 status byte.
    async fn read_stb(&mut self) -> Result<u8> {
        let reply = self.query("*STB?", None).await?;
        parse_status_byte(&reply)
    }

    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration);

    fn read_termination(&self) -> &str;

    fn set_read_termination(&mut self, termination: &str);

    fn write_termination(&self) -> &str;

    fn set_write_termination(&mut self, termination: &str);
}

pub(crate) fn parse_status_byte(reply: &str) -> Result<u8> {
    let reply = reply.trim();
    reply
        .parse::<u8>()
        .map_err(|_| Error::Protocol(format!("invalid status byte '{reply}'")))
}

/// Everything a factory needs to construct a transport for one address.
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub address: ResourceAddress,
    pub settings: TransportSettings,
    pub serial: SerialConfig,
}

impl TransportConfig {
    pub fn new(address: ResourceAddress) -> TransportConfig {
        TransportConfig {
            address,
            settings: TransportSettings::default(),
            serial: SerialConfig::default(),
        }
    }
}

/// Creates closed transports for one interface kind.
///
/// Implemented for every `Fn(&TransportConfig) -> Result<Box<dyn Transport>>`, so tests
/// can install closures.
pub trait TransportFactory: Send + Sync {
    fn create(&self, config: &TransportConfig) -> Result<Box<dyn Transport>>;
}

impl<F> TransportFactory for F
where
    F: Fn(&TransportConfig) -> Result<Box<dyn Transport>> + Send + Sync,
{
    fn create(&self, config: &TransportConfig) -> Result<Box<dyn Transport>> {
        self(config)
    }
}

/// Factory for interfaces without a built-in backend.
pub(crate) struct UnsupportedFactory {
    pub(crate) reason: &'static str,
}

impl TransportFactory for UnsupportedFactory {
    fn create(&self, config: &TransportConfig) -> Result<Box<dyn Transport>> {
        Err(Error::UnsupportedInterface(format!(
            "{}: {}",
            config.address, self.reason
        )))
    }
}
