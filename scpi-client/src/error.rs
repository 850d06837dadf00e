use std::{io, time::Duration};

use scpi_protocol::error::{AddressError, BlockError, ConversionError, FormatError};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by transports, resources and the resource manager.
///
/// Errors produced by a transport are passed through to callers unchanged.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid resource address: {0}")]
    InvalidAddress(String),
    #[error("Unsupported interface: {0}")]
    UnsupportedInterface(String),
    #[error("Resource {0} is not open")]
    NotOpen(String),
    #[error("Resource conflict: {0}")]
    ResourceConflict(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Failed to parse '{token}': {message}")]
    Parse { token: String, message: String },
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Failure reported by a transport that has no better category.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<AddressError> for Error {
    fn from(value: AddressError) -> Self {
        match value {
            AddressError::Invalid(message) => Error::InvalidAddress(message),
            AddressError::UnsupportedInterface(message) => Error::UnsupportedInterface(message),
        }
    }
}

impl From<BlockError> for Error {
    fn from(value: BlockError) -> Self {
        Error::Protocol(value.to_string())
    }
}

impl From<FormatError> for Error {
    fn from(value: FormatError) -> Self {
        Error::Protocol(value.to_string())
    }
}

impl From<ConversionError> for Error {
    fn from(value: ConversionError) -> Self {
        Error::Parse {
            token: value.token,
            message: value.message,
        }
    }
}
