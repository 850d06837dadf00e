use thiserror::Error;

/// Errors that may occur when parsing a resource address string.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum AddressError {
    /// The string is malformed: bad hex id, missing or out-of-range port, missing fields.
    #[error("Invalid resource address: {0}")]
    Invalid(String),
    /// The interface is recognized but not supported (e.g. GPIB, VXI-11).
    #[error("Unsupported interface: {0}")]
    UnsupportedInterface(String),
}

/// Errors that may occur when decoding an IEEE-488.2 binary block.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum BlockError {
    #[error("Invalid block header: {0}")]
    InvalidHeader(String),
    #[error("Block header truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
}

/// Errors related to binary datatype codes.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FormatError {
    #[error("Unknown binary datatype '{0}'")]
    UnknownDatatype(String),
}

/// A caller-supplied converter rejected an ASCII token.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("Failed to convert '{token}': {message}")]
pub struct ConversionError {
    pub token: String,
    pub message: String,
}
