//! Framing of termination-delimited SCPI messages for `tokio_util::codec`.
use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Splits incoming bytes on a read termination and appends a write termination to
/// outgoing messages.
///
/// An empty read termination disables framing: [`Decoder::decode`] never yields a frame
/// and [`Decoder::decode_eof`] returns whatever is buffered.
#[derive(Clone, Debug)]
pub struct TerminatedCodec {
    read_termination: Vec<u8>,
    write_termination: Vec<u8>,
    max_length: usize,
    // Bytes before this index are known not to start a termination sequence.
    next_index: usize,
}

impl TerminatedCodec {
    pub fn new(read_termination: &str, write_termination: &str) -> TerminatedCodec {
        TerminatedCodec {
            read_termination: read_termination.as_bytes().to_vec(),
            write_termination: write_termination.as_bytes().to_vec(),
            max_length: usize::MAX,
            next_index: 0,
        }
    }

    /// Fails decoding once more than `max_length` bytes are buffered without a termination.
    pub fn with_max_length(mut self, max_length: usize) -> TerminatedCodec {
        self.max_length = max_length;
        self
    }

    pub fn set_read_termination(&mut self, termination: &str) {
        self.read_termination = termination.as_bytes().to_vec();
        self.next_index = 0;
    }

    pub fn set_write_termination(&mut self, termination: &str) {
        self.write_termination = termination.as_bytes().to_vec();
    }

    pub fn read_termination(&self) -> &[u8] {
        &self.read_termination
    }

    pub fn write_termination(&self) -> &[u8] {
        &self.write_termination
    }

    /// Forgets the search position, e.g. after the buffer was cleared externally.
    pub fn reset(&mut self) {
        self.next_index = 0;
    }
}

impl Default for TerminatedCodec {
    fn default() -> Self {
        TerminatedCodec::new("\n", "\n")
    }
}

impl Decoder for TerminatedCodec {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, io::Error> {
        let termination = &self.read_termination;
        if termination.is_empty() {
            return Ok(None);
        }
        let start = self
            .next_index
            .saturating_sub(termination.len() - 1)
            .min(src.len());
        let found = src[start..]
            .windows(termination.len())
            .position(|window| window == termination.as_slice());
        match found {
            Some(offset) => {
                let frame = src.split_to(start + offset);
                src.advance(termination.len());
                self.next_index = 0;
                Ok(Some(frame))
            }
            None if src.len() > self.max_length => {
                self.next_index = 0;
                Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "no termination within {} buffered bytes",
                        self.max_length
                    ),
                ))
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, io::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                self.next_index = 0;
                Ok(Some(src.split()))
            }
        }
    }
}

impl Encoder<&str> for TerminatedCodec {
    type Error = io::Error;

    fn encode(&mut self, item: &str, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(item.len() + self.write_termination.len());
        dst.put_slice(item.as_bytes());
        dst.put_slice(&self.write_termination);
        Ok(())
    }
}
