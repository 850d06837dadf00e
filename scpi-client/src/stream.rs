//! Transports over byte streams: TCP sockets and, with the `serial` feature, serial ports.
use std::{io, time::Duration};

use async_trait::async_trait;
use bytes::BytesMut;
use scpi_protocol::{ResourceAddress, codec::TerminatedCodec};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    error::{Error, Result},
    transport::{Transport, TransportConfig, TransportFactory, TransportSettings},
};

const READ_CHUNK: usize = 64 * 1024;

/// Establishes the underlying stream when a [`StreamTransport`] is opened.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, timeout: Duration) -> Result<Self::Stream>;

    /// Human readable endpoint, used in errors and logs.
    fn endpoint(&self) -> String;
}

/// A [`Transport`] over any async byte stream.
///
/// Received bytes are buffered, text replies are framed on the read termination and
/// every read is bounded by the configured timeout. Unread input left over from an
/// earlier reply is discarded before each text [`Transport::write`], so a new command is
/// never paired with a stale reply.
pub struct StreamTransport<C: Connector> {
    connector: C,
    stream: Option<C::Stream>,
    settings: TransportSettings,
    codec: TerminatedCodec,
    buffer: BytesMut,
}

impl<C: Connector> StreamTransport<C> {
    pub fn new(connector: C, settings: TransportSettings) -> StreamTransport<C> {
        let codec = TerminatedCodec::new(&settings.read_termination, &settings.write_termination);
        StreamTransport {
            connector,
            stream: None,
            settings,
            codec,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    fn not_open(&self) -> Error {
        Error::NotOpen(self.connector.endpoint())
    }

    fn discard_input(&mut self) {
        if !self.buffer.is_empty() {
            log::debug!(
                "Discarding {} unread bytes from {}",
                self.buffer.len(),
                self.connector.endpoint()
            );
            self.buffer.clear();
        }
        self.codec.reset();
    }

    /// Reads at least one more byte into the buffer.
    async fn fill(&mut self) -> Result<usize> {
        let timeout = self.settings.timeout;
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::NotOpen(self.connector.endpoint()));
        };
        self.buffer.reserve(READ_CHUNK);
        let read = tokio::time::timeout(timeout, stream.read_buf(&mut self.buffer))
            .await
            .map_err(|_| Error::Timeout(timeout))??;
        if read == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} closed the connection", self.connector.endpoint()),
            )));
        }
        log::trace!("Received {} bytes from {}", read, self.connector.endpoint());
        Ok(read)
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let timeout = self.settings.timeout;
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::NotOpen(self.connector.endpoint()));
        };
        tokio::time::timeout(timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| Error::Timeout(timeout))??;
        Ok(())
    }
}

#[async_trait]
impl<C: Connector> Transport for StreamTransport<C> {
    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        log::debug!("Connecting to {}", self.connector.endpoint());
        let stream = self.connector.connect(self.settings.timeout).await?;
        self.stream = Some(stream);
        self.discard_input();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            self.discard_input();
            stream.shutdown().await?;
            log::debug!("Disconnected from {}", self.connector.endpoint());
        }
        Ok(())
    }

    async fn write(&mut self, message: &str) -> Result<()> {
        if self.stream.is_none() {
            return Err(self.not_open());
        }
        self.discard_input();
        let mut frame = BytesMut::new();
        self.codec.encode(message, &mut frame)?;
        log::trace!("Sending {:?} to {}", message, self.connector.endpoint());
        self.send(&frame).await
    }

    async fn read(&mut self) -> Result<String> {
        if self.stream.is_none() {
            return Err(self.not_open());
        }
        if self.codec.read_termination().is_empty() {
            if self.buffer.is_empty() {
                self.fill().await?;
            }
            let frame = self.buffer.split();
            return Ok(String::from_utf8_lossy(&frame).into_owned());
        }
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer)? {
                return Ok(String::from_utf8_lossy(&frame).into_owned());
            }
            self.fill().await?;
        }
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<usize> {
        if self.stream.is_none() {
            return Err(self.not_open());
        }
        log::trace!("Sending raw {:02x?}", data);
        self.send(data).await?;
        Ok(data.len())
    }

    async fn read_raw(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        if self.stream.is_none() {
            return Err(self.not_open());
        }
        if self.buffer.is_empty() {
            self.fill().await?;
        }
        let count = max_bytes.min(self.buffer.len());
        self.codec.reset();
        Ok(self.buffer.split_to(count).to_vec())
    }

    async fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        if self.stream.is_none() {
            return Err(self.not_open());
        }
        while self.buffer.len() < count {
            self.fill().await?;
        }
        self.codec.reset();
        Ok(self.buffer.split_to(count).to_vec())
    }

    async fn clear(&mut self) -> Result<()> {
        if self.stream.is_none() {
            return Err(self.not_open());
        }
        self.discard_input();
        self.write("*CLS").await
    }

    fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.settings.timeout = timeout;
    }

    fn read_termination(&self) -> &str {
        &self.settings.read_termination
    }

    fn set_read_termination(&mut self, termination: &str) {
        self.settings.read_termination = termination.to_string();
        self.codec.set_read_termination(termination);
    }

    fn write_termination(&self) -> &str {
        &self.settings.write_termination
    }

    fn set_write_termination(&mut self, termination: &str) {
        self.settings.write_termination = termination.to_string();
        self.codec.set_write_termination(termination);
    }
}

/// Connects to `host:port` over TCP.
#[derive(Clone, Debug)]
pub struct TcpConnector {
    host: String,
    port: u16,
}

impl TcpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> TcpConnector {
        TcpConnector {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, timeout: Duration) -> Result<TcpStream> {
        let stream = tokio::time::timeout(
            timeout,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| Error::Timeout(timeout))??;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub type TcpSocketTransport = StreamTransport<TcpConnector>;

/// Default factory for `TCPIP::SOCKET` resources.
pub struct TcpSocketFactory;

impl TransportFactory for TcpSocketFactory {
    fn create(&self, config: &TransportConfig) -> Result<Box<dyn Transport>> {
        match &config.address {
            ResourceAddress::TcpSocket { host, port, .. } => Ok(Box::new(
                StreamTransport::new(TcpConnector::new(host.clone(), *port), config.settings.clone()),
            )),
            other => Err(Error::UnsupportedInterface(format!(
                "{other} is not a TCPIP SOCKET resource"
            ))),
        }
    }
}

#[cfg(feature = "serial")]
pub use serial_port::{SerialConnector, SerialFactory, SerialTransport};

#[cfg(feature = "serial")]
mod serial_port {
    use std::time::Duration;

    use async_trait::async_trait;
    use scpi_protocol::ResourceAddress;
    use tokio_serial::{SerialPortBuilderExt, SerialStream};

    use super::StreamTransport;
    use crate::{
        error::{Error, Result},
        serial::{FlowControl, Parity, SerialConfig},
        transport::{Transport, TransportConfig, TransportFactory},
    };

    /// Opens a serial port with the configured line settings.
    #[derive(Clone, Debug)]
    pub struct SerialConnector {
        path: String,
        config: SerialConfig,
    }

    impl SerialConnector {
        pub fn new(path: impl Into<String>, config: SerialConfig) -> SerialConnector {
            SerialConnector {
                path: path.into(),
                config,
            }
        }
    }

    fn data_bits(bits: u8) -> Result<tokio_serial::DataBits> {
        match bits {
            5 => Ok(tokio_serial::DataBits::Five),
            6 => Ok(tokio_serial::DataBits::Six),
            7 => Ok(tokio_serial::DataBits::Seven),
            8 => Ok(tokio_serial::DataBits::Eight),
            other => Err(Error::Transport(format!("unsupported data bits {other}"))),
        }
    }

    fn stop_bits(bits: u8) -> Result<tokio_serial::StopBits> {
        match bits {
            1 => Ok(tokio_serial::StopBits::One),
            2 => Ok(tokio_serial::StopBits::Two),
            other => Err(Error::Transport(format!("unsupported stop bits {other}"))),
        }
    }

    #[async_trait]
    impl super::Connector for SerialConnector {
        type Stream = SerialStream;

        async fn connect(&self, timeout: Duration) -> Result<SerialStream> {
            let parity = match self.config.parity {
                Parity::None => tokio_serial::Parity::None,
                Parity::Odd => tokio_serial::Parity::Odd,
                Parity::Even => tokio_serial::Parity::Even,
            };
            let flow_control = match self.config.flow_control {
                FlowControl::None => tokio_serial::FlowControl::None,
                FlowControl::Software => tokio_serial::FlowControl::Software,
                FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
            };
            let port = tokio_serial::new(self.path.as_str(), self.config.baud_rate)
                .data_bits(data_bits(self.config.data_bits)?)
                .parity(parity)
                .stop_bits(stop_bits(self.config.stop_bits)?)
                .flow_control(flow_control)
                .timeout(timeout)
                .open_native_async()
                .map_err(std::io::Error::from)?;
            Ok(port)
        }

        fn endpoint(&self) -> String {
            format!("{}@{}", self.path, self.config.baud_rate)
        }
    }

    pub type SerialTransport = StreamTransport<SerialConnector>;

    /// Default factory for `ASRL` resources.
    pub struct SerialFactory;

    impl TransportFactory for SerialFactory {
        fn create(&self, config: &TransportConfig) -> Result<Box<dyn Transport>> {
            match &config.address {
                ResourceAddress::Serial { port, .. } => Ok(Box::new(StreamTransport::new(
                    SerialConnector::new(port.clone(), config.serial.clone()),
                    config.settings.clone(),
                ))),
                other => Err(Error::UnsupportedInterface(format!(
                    "{other} is not a serial resource"
                ))),
            }
        }
    }
}
