//! # KISS Protocol Constants and Types
//!
//! Core protocol definitions for the KISS link: special bytes, the header space,
//! link status and frame classification.

use crate::error::{KissError, Result};

/// Frame delimiter
pub const FEND: u8 = 0xC0;

/// Escape prefix
pub const FESC: u8 = 0xDB;

/// Transposed FEND (follows FESC)
pub const TFEND: u8 = 0xDC;

/// Transposed FESC (follows FESC)
pub const TFESC: u8 = 0xDD;

/// Maximum number of sync padding FENDs sent ahead of a frame
pub const MAX_PADDING: usize = 32;

/// Smallest complete frame: FEND + header + FEND
pub const MIN_FRAME_LEN: usize = 3;

/// Size of the trailing CRC32 once unstuffed
pub const CRC32_LEN: usize = 4;

/// Size of a parameter identifier
pub const PARAM_ID_LEN: usize = 2;

/// Highest data port number (low nibble of a data header)
pub const MAX_DATA_PORT: u8 = 0x0F;

/// TX delay control frame (1-byte payload)
pub const HEADER_TX_DELAY: u8 = 0x10;

/// Parameter request; also used for the reply carrying the value
pub const HEADER_REQUEST_PARAM: u8 = 0x40;

/// Parameter update (ID + value)
pub const HEADER_SET_PARAM: u8 = 0x50;

/// Speed control frame (4-byte little-endian baud rate)
pub const HEADER_SPEED: u8 = 0x60;

/// Command frame (2-byte little-endian code)
pub const HEADER_COMMAND: u8 = 0x70;

/// Ping control frame
pub const HEADER_PING: u8 = 0x80;

/// Acknowledge control frame
pub const HEADER_ACK: u8 = 0xA0;

/// Negative acknowledge control frame
pub const HEADER_NACK: u8 = 0xA5;

/// Build the header for a data port (0-15)
///
/// # Errors
///
/// Returns `InvalidParams` if `port` is above 15.
pub fn data_header(port: u8) -> Result<u8> {
    if port > MAX_DATA_PORT {
        return Err(KissError::InvalidParams("data port must be 0-15"));
    }
    Ok(port)
}

/// Link status as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Freshly initialized, or the last receive found nothing
    Nothing,
    /// A frame is encoded in the buffer and may be extended or sent
    Transmitting,
    /// The encoded frame was handed to the transport
    Transmitted,
    /// The assembler is collecting bytes
    Receiving,
    /// A raw frame is in the buffer (and, after decode, was valid)
    Received,
    /// The received frame failed to assemble or decode
    ReceivedError,
    /// Encoding or sending failed
    ErrorState,
}

/// Classification of the last decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFrame {
    #[default]
    None,
    Ack,
    Nack,
    Ping,
}

impl ControlFrame {
    pub fn from_header(header: u8) -> Self {
        match header {
            HEADER_ACK => ControlFrame::Ack,
            HEADER_NACK => ControlFrame::Nack,
            HEADER_PING => ControlFrame::Ping,
            _ => ControlFrame::None,
        }
    }
}

/// Purpose of a frame, derived from its header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Data(u8),
    TxDelay,
    RequestParam,
    SetParam,
    Speed,
    Command,
    Ping,
    Ack,
    Nack,
    Unknown(u8),
}

impl FrameKind {
    pub fn from_header(header: u8) -> Self {
        match header {
            0x00..=MAX_DATA_PORT => FrameKind::Data(header),
            HEADER_TX_DELAY => FrameKind::TxDelay,
            HEADER_REQUEST_PARAM => FrameKind::RequestParam,
            HEADER_SET_PARAM => FrameKind::SetParam,
            HEADER_SPEED => FrameKind::Speed,
            HEADER_COMMAND => FrameKind::Command,
            HEADER_PING => FrameKind::Ping,
            HEADER_ACK => FrameKind::Ack,
            HEADER_NACK => FrameKind::Nack,
            other => FrameKind::Unknown(other),
        }
    }
}

/// Read a little-endian `u16` from the start of `bytes`
///
/// Returns `None` if fewer than 2 bytes are available.
pub fn le_u16(bytes: &[u8]) -> Option<u16> {
    match bytes {
        [a, b, ..] => Some(u16::from_le_bytes([*a, *b])),
        _ => None,
    }
}

/// Read a little-endian `u32` from the start of `bytes`
///
/// Returns `None` if fewer than 4 bytes are available.
pub fn le_u32(bytes: &[u8]) -> Option<u32> {
    match bytes {
        [a, b, c, d, ..] => Some(u32::from_le_bytes([*a, *b, *c, *d])),
        _ => None,
    }
}
