//! Simulated instruments, addressed as `SIM::<device type>::INSTR`.
//!
//! A [`SimulatedDevice`] is registered under a device type in a [`SimulatedRegistry`].
//! Every resource opened for that type talks to the same device instance through a
//! [`SimulatedTransport`].
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use bytes::BytesMut;
use scpi_protocol::{ResourceAddress, codec::TerminatedCodec};
use tokio_util::codec::Decoder;

use crate::{
    error::{Error, Result},
    transport::{Transport, TransportConfig, TransportFactory, TransportSettings},
};

/// Behaviour of a simulated instrument.
pub trait SimulatedDevice: Send {
    /// Handles one command. Returns the reply for queries, `None` for commands
    /// that produce no output.
    fn respond(&mut self, command: &str) -> Option<Vec<u8>>;

    /// Handles a raw write. The write termination has already been removed.
    ///
    /// The default decodes `data` as UTF-8 lossily and forwards it to
    /// [`SimulatedDevice::respond`], which mangles binary block payloads. Devices that
    /// accept binary data override this.
    fn respond_raw(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        self.respond(&String::from_utf8_lossy(data))
    }

    fn clear(&mut self) {}

    fn trigger(&mut self) {}

    fn read_stb(&mut self) -> u8 {
        0
    }
}

pub type SharedDevice = Arc<Mutex<Box<dyn SimulatedDevice>>>;

fn lock_device(device: &SharedDevice) -> MutexGuard<'_, Box<dyn SimulatedDevice>> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Device types available for `SIM` resources. Clones share the same registrations.
#[derive(Clone, Default)]
pub struct SimulatedRegistry {
    devices: Arc<RwLock<HashMap<String, SharedDevice>>>,
}

impl SimulatedRegistry {
    pub fn new() -> SimulatedRegistry {
        SimulatedRegistry::default()
    }

    /// Registers `device` under `device_type`, replacing any earlier registration.
    pub fn register(&self, device_type: impl Into<String>, device: impl SimulatedDevice + 'static) {
        let device_type = device_type.into();
        log::debug!("Registering simulated device '{}'", device_type);
        let device: Box<dyn SimulatedDevice> = Box::new(device);
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(device_type, Arc::new(Mutex::new(device)));
    }

    pub fn get(&self, device_type: &str) -> Result<SharedDevice> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_type)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!("no simulated device of type '{device_type}'"))
            })
    }

    /// Registered device types in sorted order.
    pub fn device_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }
}

/// A [`Transport`] backed by a [`SimulatedDevice`].
///
/// Replies are queued with the read termination appended. Reading when no reply is
/// queued fails immediately with [`Error::Timeout`] since nothing will ever arrive.
pub struct SimulatedTransport {
    name: String,
    device: SharedDevice,
    settings: TransportSettings,
    codec: TerminatedCodec,
    output: BytesMut,
    open: bool,
}

impl SimulatedTransport {
    pub fn new(name: impl Into<String>, device: SharedDevice, settings: TransportSettings) -> Self {
        let codec = TerminatedCodec::new(&settings.read_termination, &settings.write_termination);
        SimulatedTransport {
            name: name.into(),
            device,
            settings,
            codec,
            output: BytesMut::new(),
            open: false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::NotOpen(self.name.clone()))
        }
    }

    fn queue_reply(&mut self, reply: Option<Vec<u8>>) {
        if let Some(reply) = reply {
            self.output.extend_from_slice(&reply);
            self.output
                .extend_from_slice(self.settings.read_termination.as_bytes());
        }
    }

    fn nothing_to_read(&self) -> Error {
        Error::Timeout(self.settings.timeout)
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        self.output.clear();
        self.codec.reset();
        Ok(())
    }

    async fn write(&mut self, message: &str) -> Result<()> {
        self.ensure_open()?;
        let reply = lock_device(&self.device).respond(message);
        self.queue_reply(reply);
        Ok(())
    }

    async fn read(&mut self) -> Result<String> {
        self.ensure_open()?;
        let frame = if self.settings.read_termination.is_empty() {
            self.codec.decode_eof(&mut self.output)?
        } else {
            self.codec.decode(&mut self.output)?
        };
        frame
            .map(|frame| String::from_utf8_lossy(&frame).into_owned())
            .ok_or_else(|| self.nothing_to_read())
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let payload = data
            .strip_suffix(self.settings.write_termination.as_bytes())
            .unwrap_or(data);
        let reply = lock_device(&self.device).respond_raw(payload);
        self.queue_reply(reply);
        Ok(data.len())
    }

    async fn read_raw(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;
        if self.output.is_empty() {
            return Err(self.nothing_to_read());
        }
        let count = max_bytes.min(self.output.len());
        self.codec.reset();
        Ok(self.output.split_to(count).to_vec())
    }

    async fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;
        if self.output.len() < count {
            return Err(self.nothing_to_read());
        }
        self.codec.reset();
        Ok(self.output.split_to(count).to_vec())
    }

    async fn clear(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.output.clear();
        self.codec.reset();
        lock_device(&self.device).clear();
        Ok(())
    }

    async fn trigger(&mut self) -> Result<()> {
        self.ensure_open()?;
        lock_device(&self.device).trigger();
        Ok(())
    }

    async fn read_stb(&mut self) -> Result<u8> {
        self.ensure_open()?;
        Ok(lock_device(&self.device).read_stb())
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

/// Default factory for `SIM` resources, resolving device types through a registry.
pub struct SimulatedFactory {
    registry: SimulatedRegistry,
}

impl SimulatedFactory {
    pub fn new(registry: SimulatedRegistry) -> SimulatedFactory {
        SimulatedFactory { registry }
    }
}

impl TransportFactory for SimulatedFactory {
    fn create(&self, config: &TransportConfig) -> Result<Box<dyn Transport>> {
        match &config.address {
            ResourceAddress::Simulated { device_type } => Ok(Box::new(SimulatedTransport::new(
                config.address.build(),
                self.registry.get(device_type)?,
                config.settings.clone(),
            ))),
            other => Err(Error::UnsupportedInterface(format!(
                "{other} is not a simulated resource"
            ))),
        }
    }
}

/// Commands received by a [`ScriptedDevice`], shared with whoever created it.
pub type CommandLog = Arc<Mutex<Vec<String>>>;

/// Raw writes received by a [`ScriptedDevice`], byte for byte.
pub type RawLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// A device answering fixed replies to known queries.
///
/// Commands are matched case-insensitively after trimming. Unknown commands produce no
/// reply. Every received command is appended to the [`CommandLog`]. Raw writes are
/// kept unmodified in the [`RawLog`] and never answered.
#[derive(Default)]
pub struct ScriptedDevice {
    replies: HashMap<String, Vec<u8>>,
    log: CommandLog,
    raw_log: RawLog,
    status: u8,
}

impl ScriptedDevice {
    pub fn new() -> ScriptedDevice {
        ScriptedDevice::default()
    }

    pub fn with_reply(mut self, command: &str, reply: impl Into<Vec<u8>>) -> Self {
        self.replies
            .insert(command.trim().to_ascii_uppercase(), reply.into());
        self
    }

    pub fn with_status_byte(mut self, status: u8) -> Self {
        self.status = status;
        self
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    pub fn raw_log(&self) -> RawLog {
        self.raw_log.clone()
    }
}

impl SimulatedDevice for ScriptedDevice {
    fn respond(&mut self, command: &str) -> Option<Vec<u8>> {
        let command = command.trim();
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.to_string());
        self.replies.get(&command.to_ascii_uppercase()).cloned()
    }

    fn respond_raw(&mut self, data: &[u8]) -> Option<Vec<u8>> {
        self.raw_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(data.to_vec());
        None
    }

    fn read_stb(&mut self) -> u8 {
        self.status
    }
}
