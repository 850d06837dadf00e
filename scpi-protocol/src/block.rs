//! IEEE-488.2 arbitrary block framing.
//!
//! - Definite length: `#<N><length><data>` where `N` in `1..=9` is the number of
//!   decimal digits in `length`.
//! - Indefinite length: `#0<data>\n`. Data runs up to the first newline after the
//!   header, or to the end of the buffer if there is none.
use crate::error::BlockError;

/// First byte of every block.
pub const BLOCK_START: u8 = b'#';
/// Longest possible header: `#`, the digit count and nine length digits.
pub const MAX_HEADER_LEN: usize = 11;
const INDEFINITE_TERMINATOR: u8 = b'\n';

/// Location of the payload inside a buffer that starts with a block header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockHeader {
    header_len: usize,
    data_len: usize,
    indefinite: bool,
}

impl BlockHeader {
    /// Parses the header at the start of `buf`.
    ///
    /// For indefinite blocks the data length is derived from the bytes present in `buf`.
    pub fn parse(buf: &[u8]) -> Result<BlockHeader, BlockError> {
        if buf.len() < 2 {
            return Err(BlockError::Truncated {
                expected: 2,
                got: buf.len(),
            });
        }
        if buf[0] != BLOCK_START {
            return Err(BlockError::InvalidHeader(format!(
                "expected '#', found 0x{:02x}",
                buf[0]
            )));
        }
        let num_digits = match buf[1] {
            digit @ b'0'..=b'9' => (digit - b'0') as usize,
            other => {
                return Err(BlockError::InvalidHeader(format!(
                    "invalid digit count 0x{other:02x}"
                )));
            }
        };

        if num_digits == 0 {
            let data_len = buf[2..]
                .iter()
                .position(|b| *b == INDEFINITE_TERMINATOR)
                .unwrap_or(buf.len() - 2);
            return Ok(BlockHeader {
                header_len: 2,
                data_len,
                indefinite: true,
            });
        }

        let header_len = 2 + num_digits;
        if buf.len() < header_len {
            return Err(BlockError::Truncated {
                expected: header_len,
                got: buf.len(),
            });
        }
        let length_field = &buf[2..header_len];
        if !length_field.iter().all(u8::is_ascii_digit) {
            return Err(BlockError::InvalidHeader(format!(
                "invalid length field {:?}",
                String::from_utf8_lossy(length_field)
            )));
        }
        // At most nine digits, which always fits in a usize.
        let data_len = length_field
            .iter()
            .fold(0usize, |acc, digit| acc * 10 + (digit - b'0') as usize);
        Ok(BlockHeader {
            header_len,
            data_len,
            indefinite: false,
        })
    }

    /// Number of bytes taken by `#`, the digit count and the length field.
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Number of payload bytes.
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Header plus payload. The trailing newline of an indefinite block is not included.
    pub fn total_len(&self) -> usize {
        self.header_len + self.data_len
    }

    pub fn is_indefinite(&self) -> bool {
        self.indefinite
    }
}

/// Returns the definite-length header for a payload of `data_len` bytes, e.g. `#41200`.
pub fn encode_header(data_len: usize) -> String {
    let length = data_len.to_string();
    format!("#{}{}", length.len(), length)
}

/// Wraps `payload` in a definite-length block.
pub fn encode_block(payload: &[u8]) -> Vec<u8> {
    let header = encode_header(payload.len());
    let mut block = Vec::with_capacity(header.len() + payload.len());
    block.extend_from_slice(header.as_bytes());
    block.extend_from_slice(payload);
    block
}

/// Returns the payload of a complete block at the start of `buf`.
pub fn decode_block(buf: &[u8]) -> Result<&[u8], BlockError> {
    let header = BlockHeader::parse(buf)?;
    if buf.len() < header.total_len() {
        return Err(BlockError::Truncated {
            expected: header.total_len(),
            got: buf.len(),
        });
    }
    Ok(&buf[header.header_len()..header.total_len()])
}
