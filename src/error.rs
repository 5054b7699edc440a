use thiserror::Error;

/// Result type for classpatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bytecode analysis and rewriting
///
/// Every variant is unrecoverable for the operation in progress: continuing
/// after any of these risks emitting corrupted binary output, so callers get
/// the error immediately with no partial result.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed bytecode at offset {offset}: {message}")]
    Format { offset: usize, message: String },

    #[error("offset overflow: {current} + {delta} does not fit in {width} byte(s)")]
    ArithmeticOverflow { current: i64, delta: i64, width: u8 },

    #[error("unexpected opcode {found:#04x} at offset {offset}, expected {expected:#04x}")]
    State {
        offset: usize,
        expected: u8,
        found: u8,
    },

    #[error("not implemented: {message}")]
    NotImplemented { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a format error with the offending buffer offset
    pub fn format(offset: usize, message: impl Into<String>) -> Self {
        Self::Format {
            offset,
            message: message.into(),
        }
    }

    /// Create a not-implemented error for a narrow, explicit gap
    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented {
            message: message.into(),
        }
    }
}
