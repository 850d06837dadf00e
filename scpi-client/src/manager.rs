//! Opening, tracking and discovering instrument resources.
use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use scpi_protocol::{ResourceAddress, ResourcePattern, pattern::DEFAULT_QUERY};

use crate::{
    discovery::{self, Discovery, ResourceInfo, SystemDiscovery},
    error::{Error, Result},
    resource::MessageBasedResource,
    serial::{AutoBaudOptions, BaudProbe, FactoryBaudProbe, SerialConfig},
    sim::{SimulatedDevice, SimulatedFactory, SimulatedRegistry},
    stream::TcpSocketFactory,
    transport::{Transport, TransportConfig, TransportFactory, TransportSettings, UnsupportedFactory},
};

/// Options for [`ResourceManager::open_resource`].
///
/// Unset timeout and terminations keep the transport defaults.
#[derive(Clone, Debug, Default)]
pub struct OpenOptions {
    pub exclusive: bool,
    pub timeout: Option<Duration>,
    pub read_termination: Option<String>,
    pub write_termination: Option<String>,
    /// Line settings for `ASRL` resources.
    pub serial: SerialConfig,
    /// Detect the baud rate of `ASRL` resources before opening. The baud rate in
    /// `serial` is ignored when set.
    pub auto_baud: Option<AutoBaudOptions>,
}

impl OpenOptions {
    pub fn new() -> OpenOptions {
        OpenOptions::default()
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn read_termination(mut self, termination: impl Into<String>) -> Self {
        self.read_termination = Some(termination.into());
        self
    }

    pub fn write_termination(mut self, termination: impl Into<String>) -> Self {
        self.write_termination = Some(termination.into());
        self
    }

    pub fn serial(mut self, serial: SerialConfig) -> Self {
        self.serial = serial;
        self
    }

    pub fn auto_baud(mut self, options: AutoBaudOptions) -> Self {
        self.auto_baud = Some(options);
        self
    }

    fn settings(&self) -> TransportSettings {
        let mut settings = TransportSettings::default();
        if let Some(timeout) = self.timeout {
            settings.timeout = timeout;
        }
        if let Some(termination) = &self.read_termination {
            settings.read_termination = termination.clone();
        }
        if let Some(termination) = &self.write_termination {
            settings.write_termination = termination.clone();
        }
        settings
    }

    fn apply(&self, transport: &mut dyn Transport) {
        if let Some(timeout) = self.timeout {
            transport.set_timeout(timeout);
        }
        if let Some(termination) = &self.read_termination {
            transport.set_read_termination(termination);
        }
        if let Some(termination) = &self.write_termination {
            transport.set_write_termination(termination);
        }
    }
}

#[derive(Default)]
struct Tracking {
    open: Vec<MessageBasedResource>,
    exclusive: HashSet<String>,
    counts: HashMap<String, usize>,
}

/// Bookkeeping of open resources, keyed by canonical resource string.
///
/// `counts` holds shared opens only. A key is either in `exclusive` or has a shared
/// count, never both.
///
/// A key is reserved before its transport is opened so that concurrent opens of the
/// same address observe each other.
#[derive(Default)]
pub(crate) struct Tracker {
    state: Mutex<Tracking>,
}

impl Tracker {
    fn state(&self) -> MutexGuard<'_, Tracking> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self, key: &str, exclusive: bool) -> Result<()> {
        let mut state = self.state();
        if state.exclusive.contains(key) {
            return Err(Error::ResourceConflict(format!(
                "{key} is already open in exclusive mode"
            )));
        }
        let count = state.counts.get(key).copied().unwrap_or(0);
        if exclusive && count > 0 {
            return Err(Error::ResourceConflict(format!("{key} is already open")));
        }
        if exclusive {
            state.exclusive.insert(key.to_string());
        } else {
            *state.counts.entry(key.to_string()).or_insert(0) += 1;
        }
        Ok(())
    }

    fn unreserve(state: &mut Tracking, key: &str, exclusive: bool) {
        if exclusive {
            state.exclusive.remove(key);
        } else if let Some(count) = state.counts.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                state.counts.remove(key);
            }
        }
    }

    fn rollback(&self, key: &str, exclusive: bool) {
        Tracker::unreserve(&mut self.state(), key, exclusive);
    }

    fn insert(&self, resource: MessageBasedResource) {
        self.state().open.push(resource);
    }

    pub(crate) fn release(&self, resource: &MessageBasedResource) {
        let mut state = self.state();
        let Some(index) = state.open.iter().position(|r| r.id() == resource.id()) else {
            return;
        };
        state.open.remove(index);
        Tracker::unreserve(
            &mut state,
            resource.resource_string(),
            resource.is_exclusive(),
        );
    }

    fn snapshot(&self) -> Vec<MessageBasedResource> {
        self.state().open.clone()
    }

    fn count(&self, key: &str) -> usize {
        self.state().counts.get(key).copied().unwrap_or(0)
    }

    fn is_exclusive(&self, key: &str) -> bool {
        self.state().exclusive.contains(key)
    }
}

/// Opens resources and enforces exclusive access between them.
///
/// Resources returned by [`ResourceManager::open_resource`] stay tracked until they are
/// closed, either individually or through [`ResourceManager::close`]. Exclusivity is an
/// in-process lock on the canonical resource string; it does not stop another process
/// from opening the same hardware.
pub struct ResourceManager {
    tracker: Arc<Tracker>,
    usb: Arc<dyn TransportFactory>,
    serial: Arc<dyn TransportFactory>,
    tcp_socket: Arc<dyn TransportFactory>,
    simulated: Arc<dyn TransportFactory>,
    simulated_devices: SimulatedRegistry,
    discovery: Box<dyn Discovery>,
    baud_probe: Arc<dyn BaudProbe>,
    next_id: AtomicU64,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Builder::new().build()
    }
}

/// Builder to create a [ResourceManager] with custom collaborators
///
/// # Example
///
/// ```ignore
/// use scpi_client::manager::Builder;
///
/// let manager = Builder::new()
///     .tcp_socket_factory(my_factory)
///     .simulated_device("dmm", my_dmm)
///     .build();
/// ```
#[derive(Default)]
pub struct Builder {
    usb: Option<Arc<dyn TransportFactory>>,
    serial: Option<Arc<dyn TransportFactory>>,
    tcp_socket: Option<Arc<dyn TransportFactory>>,
    simulated: Option<Arc<dyn TransportFactory>>,
    simulated_devices: SimulatedRegistry,
    discovery: Option<Box<dyn Discovery>>,
    baud_probe: Option<Arc<dyn BaudProbe>>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn usb_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.usb = Some(Arc::new(factory));
        self
    }

    /// Also used by the default baud probe unless [`Builder::baud_probe`] is set.
    pub fn serial_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.serial = Some(Arc::new(factory));
        self
    }

    pub fn tcp_socket_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.tcp_socket = Some(Arc::new(factory));
        self
    }

    /// Replaces the registry-backed factory for `SIM` resources.
    pub fn simulated_factory(mut self, factory: impl TransportFactory + 'static) -> Self {
        self.simulated = Some(Arc::new(factory));
        self
    }

    pub fn simulated_device(
        self,
        device_type: impl Into<String>,
        device: impl SimulatedDevice + 'static,
    ) -> Self {
        self.simulated_devices.register(device_type, device);
        self
    }

    pub fn discovery(mut self, discovery: impl Discovery + 'static) -> Self {
        self.discovery = Some(Box::new(discovery));
        self
    }

    pub fn baud_probe(mut self, probe: impl BaudProbe + 'static) -> Self {
        self.baud_probe = Some(Arc::new(probe));
        self
    }

    /// Build and return the manager
    pub fn build(self) -> ResourceManager {
        let serial = self.serial.unwrap_or_else(default_serial_factory);
        let baud_probe = self
            .baud_probe
            .unwrap_or_else(|| Arc::new(FactoryBaudProbe::new(serial.clone())));
        let simulated = self.simulated.unwrap_or_else(|| {
            Arc::new(SimulatedFactory::new(self.simulated_devices.clone()))
        });
        ResourceManager {
            tracker: Arc::default(),
            usb: self.usb.unwrap_or_else(|| {
                Arc::new(UnsupportedFactory {
                    reason: "no USB backend is available",
                })
            }),
            serial,
            tcp_socket: self.tcp_socket.unwrap_or_else(|| Arc::new(TcpSocketFactory)),
            simulated,
            simulated_devices: self.simulated_devices,
            discovery: self
                .discovery
                .unwrap_or_else(|| Box::new(SystemDiscovery)),
            baud_probe,
            next_id: AtomicU64::new(1),
        }
    }
}

#[cfg(feature = "serial")]
fn default_serial_factory() -> Arc<dyn TransportFactory> {
    Arc::new(crate::stream::SerialFactory)
}

#[cfg(not(feature = "serial"))]
fn default_serial_factory() -> Arc<dyn TransportFactory> {
    Arc::new(UnsupportedFactory {
        reason: "serial support requires the 'serial' feature",
    })
}

impl ResourceManager {
    pub fn new() -> ResourceManager {
        ResourceManager::default()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Opens the resource at `resource`.
    ///
    /// Fails with [`Error::ResourceConflict`] when the address is open exclusively, or
    /// when exclusive access is requested while it is open at all. Transport errors are
    /// returned unchanged.
    pub async fn open_resource(
        &self,
        resource: &str,
        options: OpenOptions,
    ) -> Result<MessageBasedResource> {
        if resource.trim().is_empty() {
            return Err(Error::InvalidAddress(
                "resource string must not be empty".to_string(),
            ));
        }
        let address = ResourceAddress::parse(resource)?;
        let factory = self.factory(&address)?;
        let key = address.build();
        self.tracker.reserve(&key, options.exclusive)?;
        log::debug!(
            "Reserved {} ({})",
            key,
            if options.exclusive {
                "exclusive"
            } else {
                "shared"
            }
        );

        match self.connect(factory.as_ref(), &address, &options).await {
            Ok(transport) => {
                let resource = MessageBasedResource::new(
                    self.next_id.fetch_add(1, Ordering::Relaxed),
                    address,
                    options.exclusive,
                    transport,
                    Arc::downgrade(&self.tracker),
                );
                self.tracker.insert(resource.clone());
                log::info!("Opened {}", key);
                Ok(resource)
            }
            Err(e) => {
                self.tracker.rollback(&key, options.exclusive);
                log::debug!("Opening {} failed: {}", key, e);
                Err(e)
            }
        }
    }

    fn factory(&self, address: &ResourceAddress) -> Result<Arc<dyn TransportFactory>> {
        match address {
            ResourceAddress::Usb { .. } => Ok(self.usb.clone()),
            ResourceAddress::Serial { .. } => Ok(self.serial.clone()),
            ResourceAddress::TcpSocket { .. } => Ok(self.tcp_socket.clone()),
            ResourceAddress::Simulated { .. } => Ok(self.simulated.clone()),
            ResourceAddress::TcpInstr { .. } => Err(Error::UnsupportedInterface(
                scpi_protocol::address::VXI11_UNSUPPORTED.to_string(),
            )),
        }
    }

    async fn connect(
        &self,
        factory: &dyn TransportFactory,
        address: &ResourceAddress,
        options: &OpenOptions,
    ) -> Result<Box<dyn Transport>> {
        let mut serial = options.serial.clone();
        if let (ResourceAddress::Serial { port, .. }, Some(auto_baud)) =
            (address, &options.auto_baud)
        {
            let baud_rate = self.baud_probe.probe(port, auto_baud, &serial).await?;
            log::info!("Detected {} baud on {}", baud_rate, port);
            serial.baud_rate = baud_rate;
        }
        let config = TransportConfig {
            address: address.clone(),
            settings: options.settings(),
            serial,
        };
        let mut transport = factory.create(&config)?;
        transport.open().await?;
        options.apply(transport.as_mut());
        log::debug!(
            "Applied settings to {}: timeout {:?}",
            config.address,
            transport.timeout()
        );
        Ok(transport)
    }

    /// Resources currently open, in the order they were opened.
    pub fn open_resources(&self) -> Vec<MessageBasedResource> {
        self.tracker.snapshot()
    }

    /// Number of shared opens of `resource`. Exclusive opens are reported by
    /// [`ResourceManager::is_exclusive`] instead. Unparseable strings have none.
    pub fn open_count(&self, resource: &str) -> usize {
        ResourceAddress::parse(resource)
            .map(|address| self.tracker.count(&address.build()))
            .unwrap_or(0)
    }

    pub fn is_exclusive(&self, resource: &str) -> bool {
        ResourceAddress::parse(resource)
            .map(|address| self.tracker.is_exclusive(&address.build()))
            .unwrap_or(false)
    }

    /// Makes `device` available as `SIM::<device_type>::INSTR`.
    pub fn register_simulated(
        &self,
        device_type: impl Into<String>,
        device: impl SimulatedDevice + 'static,
    ) {
        self.simulated_devices.register(device_type, device);
    }

    /// Closes every open resource.
    ///
    /// All resources are closed and untracked even if some fail to close; the first
    /// failure is returned afterwards.
    pub async fn close(&self) -> Result<()> {
        let resources = self.tracker.snapshot();
        log::info!("Closing {} open resources", resources.len());
        let mut first_error = None;
        for resource in resources {
            if let Err(e) = resource.close().await {
                log::warn!("Failed to close {}: {}", resource.resource_string(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Canonical resource strings of discoverable resources matching `query`
    /// (default `?*::INSTR`).
    pub async fn list_resources(&self, query: Option<&str>) -> Result<Vec<String>> {
        Ok(self
            .list_resources_info(query)
            .await?
            .into_iter()
            .map(|info| info.resource_string)
            .collect())
    }

    /// Simulated devices, serial ports and USB devices matching `query`, in that order.
    pub async fn list_resources_info(&self, query: Option<&str>) -> Result<Vec<ResourceInfo>> {
        let pattern = ResourcePattern::new(query.unwrap_or(DEFAULT_QUERY))?;
        let mut found: Vec<ResourceInfo> = self
            .simulated_devices
            .device_types()
            .into_iter()
            .map(discovery::simulated_resource)
            .collect();
        found.extend(
            self.discovery
                .list_serial_ports()
                .await?
                .into_iter()
                .map(discovery::serial_resource),
        );
        found.extend(
            self.discovery
                .list_usb_devices()
                .await?
                .into_iter()
                .map(discovery::usb_resource),
        );
        found.retain(|info| pattern.matches(&info.resource_string));
        log::debug!(
            "Discovered {} resources matching '{}'",
            found.len(),
            pattern.as_str()
        );
        Ok(found)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        discovery::{SerialPortInfo, UsbDeviceInfo},
        mock::{Call, CallLog, MockTransport},
        sim::ScriptedDevice,
    };
    use async_trait::async_trait;

    const SCOPE: &str = "TCPIP0::192.168.1.10::5025::SOCKET";

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn mock_factory(_: &TransportConfig) -> Result<Box<dyn Transport>> {
        Ok(Box::new(MockTransport::new()))
    }

    fn manager() -> ResourceManager {
        ResourceManager::builder()
            .tcp_socket_factory(mock_factory)
            .serial_factory(mock_factory)
            .build()
    }

    #[tokio::test]
    async fn exclusive_blocks_any_second_open() {
        init();
        let manager = manager();
        let first = manager
            .open_resource(SCOPE, OpenOptions::new().exclusive(true))
            .await
            .unwrap();
        assert!(manager.is_exclusive(SCOPE));

        for exclusive in [false, true] {
            match manager
                .open_resource(SCOPE, OpenOptions::new().exclusive(exclusive))
                .await
            {
                Err(Error::ResourceConflict(message)) => {
                    assert!(message.contains("exclusive mode"), "{message}")
                }
                other => panic!("expected conflict, got {other:?}"),
            }
        }

        first.close().await.unwrap();
        assert!(!manager.is_exclusive(SCOPE));
        manager
            .open_resource(SCOPE, OpenOptions::new().exclusive(true))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn exclusive_open_is_not_counted_as_shared() {
        let manager = manager();
        let resource = manager
            .open_resource(SCOPE, OpenOptions::new().exclusive(true))
            .await
            .unwrap();
        assert!(manager.is_exclusive(SCOPE));
        assert_eq!(manager.open_count(SCOPE), 0);

        resource.close().await.unwrap();
        assert!(!manager.is_exclusive(SCOPE));
        assert_eq!(manager.open_count(SCOPE), 0);
        manager.open_resource(SCOPE, OpenOptions::new()).await.unwrap();
        assert_eq!(manager.open_count(SCOPE), 1);
    }

    #[tokio::test]
    async fn exclusive_after_shared_fails() {
        let manager = manager();
        manager.open_resource(SCOPE, OpenOptions::new()).await.unwrap();
        match manager
            .open_resource(SCOPE, OpenOptions::new().exclusive(true))
            .await
        {
            Err(Error::ResourceConflict(message)) => {
                assert!(message.ends_with("already open"), "{message}")
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(manager.open_count(SCOPE), 1);
    }

    #[tokio::test]
    async fn shared_opens_are_counted() {
        let manager = manager();
        let first = manager.open_resource(SCOPE, OpenOptions::new()).await.unwrap();
        // Same address spelled differently.
        let second = manager
            .open_resource("tcpip::192.168.1.10::5025::socket", OpenOptions::new())
            .await
            .unwrap();
        assert_eq!(manager.open_count(SCOPE), 2);
        assert_eq!(manager.open_resources().len(), 2);

        first.close().await.unwrap();
        assert_eq!(manager.open_count(SCOPE), 1);
        assert!(!second.is_closed());
        assert_eq!(manager.open_resources()[0].resource_string(), SCOPE);
    }

    #[tokio::test]
    async fn address_errors() {
        let manager = manager();
        assert!(matches!(
            manager.open_resource("  ", OpenOptions::new()).await,
            Err(Error::InvalidAddress(_))
        ));
        match manager
            .open_resource("TCPIP0::192.168.1.100::INSTR", OpenOptions::new())
            .await
        {
            Err(Error::UnsupportedInterface(message)) => assert!(message.contains("VXI-11")),
            other => panic!("expected unsupported interface, got {other:?}"),
        }
        assert!(matches!(
            manager
                .open_resource("USB0::0x1AB1::0x04CE::DS1ZA1::INSTR", OpenOptions::new())
                .await,
            Err(Error::UnsupportedInterface(_))
        ));
        assert!(matches!(
            manager.open_resource("SIM::nothing::INSTR", OpenOptions::new()).await,
            Err(Error::NotFound(_))
        ));
        assert!(manager.open_resources().is_empty());
    }

    #[tokio::test]
    async fn failed_open_releases_reservation() {
        let manager = ResourceManager::builder()
            .tcp_socket_factory(|_: &TransportConfig| -> Result<Box<dyn Transport>> {
                Ok(Box::new(MockTransport::new().failing_open()))
            })
            .build();
        assert!(matches!(
            manager
                .open_resource(SCOPE, OpenOptions::new().exclusive(true))
                .await,
            Err(Error::Transport(_))
        ));
        assert_eq!(manager.open_count(SCOPE), 0);
        assert!(!manager.is_exclusive(SCOPE));
    }

    #[tokio::test]
    async fn overrides_are_applied() {
        let manager = manager();
        let resource = manager
            .open_resource(
                SCOPE,
                OpenOptions::new()
                    .timeout(Duration::from_millis(100))
                    .read_termination("\r\n")
                    .write_termination("\r"),
            )
            .await
            .unwrap();
        assert_eq!(resource.timeout().await, Duration::from_millis(100));
        assert_eq!(resource.read_termination().await, "\r\n");
        assert_eq!(resource.write_termination().await, "\r");
    }

    #[tokio::test]
    async fn bulk_close_continues_after_failure() {
        let calls = CallLog::default();
        let log = calls.clone();
        let manager = ResourceManager::builder()
            .tcp_socket_factory(move |config: &TransportConfig| -> Result<Box<dyn Transport>> {
                let mock = MockTransport::new().with_calls(log.clone());
                let mock = match &config.address {
                    ResourceAddress::TcpSocket { port: 1, .. } => mock.failing_close(),
                    _ => mock,
                };
                Ok(Box::new(mock))
            })
            .build();
        let failing = manager
            .open_resource("TCPIP0::host::1::SOCKET", OpenOptions::new())
            .await
            .unwrap();
        let healthy = manager
            .open_resource("TCPIP0::host::2::SOCKET", OpenOptions::new())
            .await
            .unwrap();

        assert!(manager.close().await.is_err());
        assert!(failing.is_closed());
        assert!(healthy.is_closed());
        assert!(manager.open_resources().is_empty());
        assert_eq!(manager.open_count("TCPIP0::host::1::SOCKET"), 0);
        assert_eq!(
            calls.take(),
            vec![Call::Open, Call::Open, Call::Close, Call::Close]
        );
    }

    struct FixedProbe(u32);

    #[async_trait]
    impl BaudProbe for FixedProbe {
        async fn probe(
            &self,
            _port: &str,
            _options: &AutoBaudOptions,
            _serial: &SerialConfig,
        ) -> Result<u32> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn auto_baud_overrides_explicit_rate() {
        let rates = Arc::new(Mutex::new(Vec::new()));
        let seen = rates.clone();
        let manager = ResourceManager::builder()
            .serial_factory(move |config: &TransportConfig| -> Result<Box<dyn Transport>> {
                seen.lock().unwrap().push(config.serial.baud_rate);
                Ok(Box::new(MockTransport::new()))
            })
            .baud_probe(FixedProbe(115_200))
            .build();

        manager
            .open_resource(
                "ASRL3::INSTR",
                OpenOptions::new().serial(SerialConfig::default().with_baud_rate(19_200)),
            )
            .await
            .unwrap();
        manager
            .open_resource(
                "ASRL4::INSTR",
                OpenOptions::new()
                    .serial(SerialConfig::default().with_baud_rate(19_200))
                    .auto_baud(AutoBaudOptions::default()),
            )
            .await
            .unwrap();
        assert_eq!(*rates.lock().unwrap(), vec![19_200, 115_200]);
    }

    #[tokio::test]
    async fn default_probe_uses_serial_factory() {
        let manager = ResourceManager::builder()
            .serial_factory(|config: &TransportConfig| -> Result<Box<dyn Transport>> {
                let mock = MockTransport::new();
                Ok(Box::new(if config.serial.baud_rate == 38_400 {
                    mock.with_reply("ACME,PSU,1,1.0")
                } else {
                    mock
                }))
            })
            .build();
        let options = OpenOptions::new().auto_baud(AutoBaudOptions::default());
        let resource = manager.open_resource("ASRL1::INSTR", options).await.unwrap();
        assert_eq!(resource.resource_string(), "ASRL1::INSTR");
    }

    struct FakeDiscovery;

    #[async_trait]
    impl Discovery for FakeDiscovery {
        async fn list_serial_ports(&self) -> Result<Vec<SerialPortInfo>> {
            Ok(vec![
                SerialPortInfo::new("COM3"),
                SerialPortInfo::new("/dev/ttyUSB0"),
            ])
        }

        async fn list_usb_devices(&self) -> Result<Vec<UsbDeviceInfo>> {
            Ok(vec![UsbDeviceInfo {
                vendor_id: 0x1AB1,
                product_id: 0x04CE,
                serial_number: Some("DS1ZA123".to_string()),
                description: Some("Oscilloscope".to_string()),
            }])
        }
    }

    #[tokio::test]
    async fn discovery_is_filtered() {
        let manager = ResourceManager::builder()
            .discovery(FakeDiscovery)
            .simulated_device("dmm", ScriptedDevice::new())
            .build();
        assert_eq!(
            manager.list_resources(None).await.unwrap(),
            vec![
                "SIM::dmm::INSTR",
                "ASRL3::INSTR",
                "ASRL/dev/ttyUSB0::INSTR",
                "USB0::0x1AB1::0x04CE::DS1ZA123::INSTR",
            ]
        );
        assert_eq!(
            manager.list_resources(Some("usb?*::INSTR")).await.unwrap(),
            vec!["USB0::0x1AB1::0x04CE::DS1ZA123::INSTR"]
        );
        assert!(
            manager
                .list_resources(Some("GPIB?*::INSTR"))
                .await
                .unwrap()
                .is_empty()
        );
        let info = manager.list_resources_info(Some("USB*")).await.unwrap();
        assert_eq!(info[0].description.as_deref(), Some("Oscilloscope"));
    }

    #[tokio::test]
    async fn simulated_resources() {
        let manager = manager();
        manager.register_simulated(
            "dmm",
            ScriptedDevice::new().with_reply("MEAS:VOLT?", "1.25,1.26"),
        );
        let dmm = manager
            .open_resource("SIM::dmm::INSTR", OpenOptions::new())
            .await
            .unwrap();
        assert_eq!(
            dmm.query_ascii_values("MEAS:VOLT?", &Default::default())
                .await
                .unwrap(),
            vec![1.25, 1.26]
        );
        manager.close().await.unwrap();
        assert!(dmm.is_closed());
    }
}
