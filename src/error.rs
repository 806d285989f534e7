//! # Error Types
//!
//! Custom error types for KISS Link using `thiserror`.

use thiserror::Error;

use crate::kiss::protocol::LinkStatus;

/// Main error type for KISS Link
#[derive(Debug, Error)]
pub enum KissError {
    /// Caller supplied an argument the engine cannot work with
    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),

    /// Unexpected byte sequence, bad escape, or truncated frame
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),

    /// An operation would exceed a fixed-capacity buffer
    #[error("buffer overflow: {0}")]
    BufferOverflow(&'static str),

    /// No complete frame arrived within the read attempt budget
    #[error("no frame received after {0} read attempts")]
    NoDataReceived(u32),

    /// Send was requested but no encoded frame is pending
    #[error("no encoded frame pending (link status {0:?})")]
    DataNotEncoded(LinkStatus),

    /// Trailing checksum does not match the frame contents
    #[error("CRC32 mismatch: frame carries 0x{expected:08X}, computed 0x{computed:08X}")]
    Crc32Mismatch { expected: u32, computed: u32 },

    /// The transport does not provide the required callback
    #[error("transport callback missing")]
    CallbackMissing,

    /// Operation is not permitted in the current link status
    #[error("operation not permitted in link status {0:?}")]
    Status(LinkStatus),

    /// Requested sync padding exceeds the fixed maximum
    #[error("padding {0} exceeds the maximum of {}", crate::kiss::protocol::MAX_PADDING)]
    PaddingOverflow(usize),

    /// Serial port errors
    #[error("serial error: {0}")]
    Serial(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for KISS Link
pub type Result<T> = std::result::Result<T, KissError>;
