use thiserror::Error;

/// A header or block field that cannot be serialized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("{field} must be {expected} hex characters, got {actual}")]
    HexLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{field} is not valid hex")]
    NotHex { field: &'static str },
    #[error("{field} value {value} is outside the u32 range")]
    OutOfRange { field: &'static str, value: i128 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Tampering targeted the protected last block or an index past it.
    #[error("block {index} cannot be tampered with (allowed range is 0..{last})")]
    Index { index: usize, last: usize },
    #[error("block {index} does not exist in a chain of {len} blocks")]
    NoSuchBlock { index: usize, len: usize },
}
