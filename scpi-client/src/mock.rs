//! In-memory transport for unit tests.
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    transport::{Transport, TransportSettings},
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Open,
    Close,
    Write(String),
    Read,
    Query(String, Option<Duration>),
    WriteRaw(Vec<u8>),
    ReadRaw(usize),
    ReadBytes(usize),
    Clear,
    Trigger,
    ReadStb,
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

#[derive(Default)]
pub struct MockTransport {
    calls: CallLog,
    replies: VecDeque<String>,
    stream: VecDeque<u8>,
    settings: TransportSettings,
    open: bool,
    fail_open: bool,
    fail_close: bool,
}

impl MockTransport {
    pub fn new() -> MockTransport {
        MockTransport::default()
    }

    pub fn connected() -> MockTransport {
        MockTransport {
            open: true,
            ..MockTransport::default()
        }
    }

    pub fn with_reply(mut self, reply: &str) -> Self {
        self.replies.push_back(reply.to_string());
        self
    }

    /// Bytes served by `read_raw` and `read_bytes`.
    pub fn with_stream(mut self, bytes: &[u8]) -> Self {
        self.stream.extend(bytes);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn with_calls(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(Error::NotOpen("mock".to_string()))
        }
    }

    fn timed_out(&self) -> Error {
        Error::Timeout(self.settings.timeout)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<()> {
        self.calls.push(Call::Open);
        if self.fail_open {
            return Err(Error::Transport("mock refused to open".to_string()));
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.calls.push(Call::Close);
        self.open = false;
        if self.fail_close {
            return Err(Error::Transport("mock refused to close".to_string()));
        }
        Ok(())
    }

    async fn write(&mut self, message: &str) -> Result<()> {
        self.ensure_open()?;
        self.calls.push(Call::Write(message.to_string()));
        Ok(())
    }

    async fn read(&mut self) -> Result<String> {
        self.ensure_open()?;
        self.calls.push(Call::Read);
        self.replies.pop_front().ok_or_else(|| self.timed_out())
    }

    async fn query(&mut self, message: &str, delay: Option<Duration>) -> Result<String> {
        self.ensure_open()?;
        self.calls.push(Call::Query(message.to_string(), delay));
        self.replies.pop_front().ok_or_else(|| self.timed_out())
    }

    async fn write_raw(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        self.calls.push(Call::WriteRaw(data.to_vec()));
        Ok(data.len())
    }

    async fn read_raw(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.calls.push(Call::ReadRaw(max_bytes));
        if self.stream.is_empty() {
            return Err(self.timed_out());
        }
        let count = max_bytes.min(self.stream.len());
        Ok(self.stream.drain(..count).collect())
    }

    async fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.calls.push(Call::ReadBytes(count));
        if self.stream.len() < count {
            return Err(self.timed_out());
        }
        Ok(self.stream.drain(..count).collect())
    }

    async fn clear(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.calls.push(Call::Clear);
        self.replies.clear();
        self.stream.clear();
        Ok(())
    }

    async fn trigger(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.calls.push(Call::Trigger);
        Ok(())
    }

    async fn read_stb(&mut self) -> Result<u8> {
        self.ensure_open()?;
        self.calls.push(Call::ReadStb);
        Ok(0)
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
    }

    fn write_termination(&self) -> &str {
        &self.settings.write_termination
    }

    fn set_write_termination(&mut self, termination: &str) {
        self.settings.write_termination = termination.to_string();
    }
}
