use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoadError>;

/// Reasons an artifact could not be loaded at all.
///
/// Unknown or unconstructible types are never reported here; they are
/// replaced by [`crate::Opaque`] placeholders.
#[derive(Error, Debug)]
pub enum LoadError {
    /// IO error while reading the artifact
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Nothing to decode
    #[error("Ran out of input")]
    Empty,

    /// The stream ended before an operand or the STOP opcode
    #[error("Pickle data was truncated at offset {offset} (needed {needed} more bytes)")]
    Truncated { offset: usize, needed: usize },

    /// Opcode byte not defined by any pickle protocol
    #[error("Invalid load key {opcode:#04x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    /// PROTO announced a protocol newer than 5
    #[error("Unsupported pickle protocol: {0}")]
    UnsupportedProtocol(u8),

    /// An opcode needed more stack items than were present
    #[error("Stack underflow in {opcode} at offset {offset}")]
    StackUnderflow { opcode: &'static str, offset: usize },

    /// An opcode needed a MARK that was never pushed
    #[error("Could not find MARK for {opcode} at offset {offset}")]
    MarkNotFound { opcode: &'static str, offset: usize },

    /// GET referenced a memo slot that was never stored
    #[error("Memo value not found at index {key} (offset {offset})")]
    MemoMissing { key: u64, offset: usize },

    /// A text operand or mutation target that makes no structural sense
    #[error("Malformed pickle at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },
}

impl LoadError {
    /// Create a malformed-stream error
    pub fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}
