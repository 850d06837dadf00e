//! The message-based protocol engine layered over a [`Transport`].
use std::{
    fmt::{Debug, Display},
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use scpi_protocol::{
    BinaryFormat, ResourceAddress,
    ascii::{self, Separator},
    block::{BlockHeader, MAX_HEADER_LEN, encode_block},
};
use tokio::sync::{Mutex, MutexGuard};

use crate::{
    error::{Error, Result},
    manager::Tracker,
    transport::Transport,
};

/// Bytes requested per raw read when receiving binary blocks.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Payload for [`MessageBasedResource::write_binary_values`].
#[derive(Copy, Clone, Debug)]
pub enum BinaryPayload<'a> {
    /// Numbers encoded with the given datatype.
    Values {
        values: &'a [f64],
        format: BinaryFormat,
    },
    /// Bytes sent as-is inside the block.
    Raw(&'a [u8]),
}

struct Shared {
    id: u64,
    address: ResourceAddress,
    resource_string: String,
    exclusive: bool,
    transport: Mutex<Box<dyn Transport>>,
    chunk_size: AtomicUsize,
    closed: AtomicBool,
    tracker: Weak<Tracker>,
}

/// An open connection to one instrument.
///
/// Handles are cheap to clone and share one transport. Each operation holds the transport
/// for its whole duration, so a query's write and read are never split. Concurrent
/// callers that need several operations to happen back to back must serialize them
/// themselves.
#[derive(Clone)]
pub struct MessageBasedResource {
    shared: Arc<Shared>,
}

impl Debug for MessageBasedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBasedResource")
            .field("resource", &self.shared.resource_string)
            .field("exclusive", &self.shared.exclusive)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl MessageBasedResource {
    pub(crate) fn new(
        id: u64,
        address: ResourceAddress,
        exclusive: bool,
        transport: Box<dyn Transport>,
        tracker: Weak<Tracker>,
    ) -> MessageBasedResource {
        MessageBasedResource {
            shared: Arc::new(Shared {
                id,
                resource_string: address.build(),
                address,
                exclusive,
                transport: Mutex::new(transport),
                chunk_size: AtomicUsize::new(DEFAULT_CHUNK_SIZE),
                closed: AtomicBool::new(false),
                tracker,
            }),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn address(&self) -> &ResourceAddress {
        &self.shared.address
    }

    /// The canonical resource string this resource was opened from.
    pub fn resource_string(&self) -> &str {
        &self.shared.resource_string
    }

    pub fn is_exclusive(&self) -> bool {
        self.shared.exclusive
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn chunk_size(&self) -> usize {
        self.shared.chunk_size.load(Ordering::Relaxed)
    }

    /// Sets the maximum number of bytes requested per raw read.
    ///
    /// Values below [`MAX_HEADER_LEN`] are raised to it so the first read can hold a
    /// complete block header.
    pub fn set_chunk_size(&self, chunk_size: usize) {
        self.shared
            .chunk_size
            .store(chunk_size.max(MAX_HEADER_LEN), Ordering::Relaxed);
    }

    async fn transport(&self) -> Result<MutexGuard<'_, Box<dyn Transport>>> {
        if self.is_closed() {
            return Err(Error::NotOpen(self.shared.resource_string.clone()));
        }
        Ok(self.shared.transport.lock().await)
    }

    pub async fn timeout(&self) -> Duration {
        self.shared.transport.lock().await.timeout()
    }

    pub async fn set_timeout(&self, timeout: Duration) {
        self.shared.transport.lock().await.set_timeout(timeout)
    }

    pub async fn read_termination(&self) -> String {
        self.shared
            .transport
            .lock()
            .await
            .read_termination()
            .to_string()
    }

    pub async fn set_read_termination(&self, termination: &str) {
        self.shared
            .transport
            .lock()
            .await
            .set_read_termination(termination)
    }

    pub async fn write_termination(&self) -> String {
        self.shared
            .transport
            .lock()
            .await
            .write_termination()
            .to_string()
    }

    pub async fn set_write_termination(&self, termination: &str) {
        self.shared
            .transport
            .lock()
            .await
            .set_write_termination(termination)
    }

    pub async fn write(&self, command: &str) -> Result<()> {
        self.transport().await?.write(command).await
    }

    pub async fn read(&self) -> Result<String> {
        self.transport().await?.read().await
    }

    pub async fn query(&self, command: &str) -> Result<String> {
        self.transport().await?.query(command, None).await
    }

    /// Like [`MessageBasedResource::query`], waiting `delay` between write and read.
    pub async fn query_with_delay(&self, command: &str, delay: Duration) -> Result<String> {
        self.transport().await?.query(command, Some(delay)).await
    }

    pub async fn write_raw(&self, data: &[u8]) -> Result<usize> {
        self.transport().await?.write_raw(data).await
    }

    pub async fn read_raw(&self, max_bytes: usize) -> Result<Vec<u8>> {
        self.transport().await?.read_raw(max_bytes).await
    }

    pub async fn read_bytes(&self, count: usize) -> Result<Vec<u8>> {
        self.transport().await?.read_bytes(count).await
    }

    /// Reads one IEEE-488.2 block and returns its payload.
    pub async fn read_binary(&self) -> Result<Vec<u8>> {
        let chunk_size = self.chunk_size();
        let mut transport = self.transport().await?;
        read_block(&mut **transport, chunk_size).await
    }

    /// Sends `command` and returns the payload of the block it answers with.
    pub async fn query_binary(&self, command: &str) -> Result<Vec<u8>> {
        let chunk_size = self.chunk_size();
        let mut transport = self.transport().await?;
        transport.write(command).await?;
        read_block(&mut **transport, chunk_size).await
    }

    pub async fn read_binary_values(&self, format: BinaryFormat) -> Result<Vec<f64>> {
        Ok(format.decode(&self.read_binary().await?))
    }

    /// Sends `command` and decodes the returned block as an array of `format` elements.
    pub async fn query_binary_values(
        &self,
        command: &str,
        format: BinaryFormat,
    ) -> Result<Vec<f64>> {
        Ok(format.decode(&self.query_binary(command).await?))
    }

    /// Sends `command` immediately followed by a definite-length block holding `payload`
    /// and the write termination. Returns the number of bytes written.
    pub async fn write_binary_values(
        &self,
        command: &str,
        payload: BinaryPayload<'_>,
    ) -> Result<usize> {
        let data = match payload {
            BinaryPayload::Values { values, format } => format.encode(values),
            BinaryPayload::Raw(bytes) => bytes.to_vec(),
        };
        let block = encode_block(&data);
        let mut transport = self.transport().await?;
        let termination = transport.write_termination().as_bytes().to_vec();
        let mut message = Vec::with_capacity(command.len() + block.len() + termination.len());
        message.extend_from_slice(command.as_bytes());
        message.extend_from_slice(&block);
        message.extend_from_slice(&termination);
        log::debug!(
            "Writing {} byte block to {}",
            data.len(),
            self.shared.resource_string
        );
        transport.write_raw(&message).await
    }

    /// Reads a reply and splits it into floats. Tokens that are not numbers are dropped.
    pub async fn read_ascii_values(&self, separator: &Separator) -> Result<Vec<f64>> {
        let reply = self.read().await?;
        Ok(ascii::parse_values(&reply, separator))
    }

    pub async fn query_ascii_values(
        &self,
        command: &str,
        separator: &Separator,
    ) -> Result<Vec<f64>> {
        let reply = self.query(command).await?;
        Ok(ascii::parse_values(&reply, separator))
    }

    /// Reads a reply and converts every token with `convert`.
    ///
    /// `Ok(None)` drops a token; `Err` fails with [`Error::Parse`].
    pub async fn read_ascii_values_with<T, E, F>(
        &self,
        separator: &Separator,
        convert: F,
    ) -> Result<Vec<T>>
    where
        E: Display,
        F: FnMut(&str) -> std::result::Result<Option<T>, E>,
    {
        let reply = self.read().await?;
        Ok(ascii::parse_values_with(&reply, separator, convert)?)
    }

    pub async fn query_ascii_values_with<T, E, F>(
        &self,
        command: &str,
        separator: &Separator,
        convert: F,
    ) -> Result<Vec<T>>
    where
        E: Display,
        F: FnMut(&str) -> std::result::Result<Option<T>, E>,
    {
        let reply = self.query(command).await?;
        Ok(ascii::parse_values_with(&reply, separator, convert)?)
    }

    /// Writes `command` followed by `values` joined with the separator. Pattern
    /// separators join with a comma.
    pub async fn write_ascii_values<T: Display>(
        &self,
        command: &str,
        values: &[T],
        separator: &Separator,
    ) -> Result<()> {
        let message = format!("{command}{}", ascii::format_values(values, separator));
        self.write(&message).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.transport().await?.clear().await
    }

    pub async fn trigger(&self) -> Result<()> {
        self.transport().await?.trigger().await
    }

    pub async fn read_stb(&self) -> Result<u8> {
        self.transport().await?.read_stb().await
    }

    /// Closes the transport and stops tracking this resource in its manager.
    ///
    /// Tracking is released even if the transport fails to close. Closing an already
    /// closed resource does nothing.
    pub async fn close(&self) -> Result<()> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.shared.transport.lock().await.close().await;
        if let Some(tracker) = self.shared.tracker.upgrade() {
            tracker.release(self);
        }
        match &result {
            Ok(()) => log::info!("Closed {}", self.shared.resource_string),
            Err(e) => log::warn!("Closing {} failed: {}", self.shared.resource_string, e),
        }
        result
    }
}

/// Reads one block with a single `read_raw(chunk_size)` and, if the block is larger than
/// what arrived, exactly one `read_bytes` for the remainder.
async fn read_block<T: Transport + ?Sized>(transport: &mut T, chunk_size: usize) -> Result<Vec<u8>> {
    let initial = transport.read_raw(chunk_size).await?;
    let header = BlockHeader::parse(&initial)?;
    log::debug!(
        "Block header: {} header bytes, {} data bytes{}",
        header.header_len(),
        header.data_len(),
        if header.is_indefinite() {
            " (indefinite)"
        } else {
            ""
        }
    );
    let total = header.total_len();
    if initial.len() >= total {
        return Ok(initial[header.header_len()..total].to_vec());
    }
    let remaining = total - initial.len();
    log::debug!(
        "Block exceeds first chunk of {} bytes, reading {} more",
        initial.len(),
        remaining
    );
    let rest = transport.read_bytes(remaining).await?;
    let mut payload = Vec::with_capacity(header.data_len());
    payload.extend_from_slice(&initial[header.header_len()..]);
    payload.extend_from_slice(&rest);
    log::trace!("Block payload: {:02x?}", payload);
    Ok(payload)
}
