//! # Parameter and Control Frames
//!
//! Parameter get/set, commands, ACK/NACK/PING and link control frames, all
//! built from the link's encode/push_encode/send primitives.
//!
//! Parameter payload layout: `[0:2)` little-endian ID, `[2:)` value.

use tracing::debug;

use super::decoder::Decoded;
use super::link::Link;
use super::protocol::*;
use crate::error::{KissError, Result};
use crate::transport::Transport;

/// Parameter extracted from a received frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub id: u16,

    /// Value bytes copied into the caller's buffer
    pub len: usize,

    /// The value did not fit and was cut at the buffer's capacity
    pub truncated: bool,
}

impl<'a, T: Transport> Link<'a, T> {
    /// Send a parameter update (`SetParam`, ID then value)
    pub fn set_param(&mut self, id: u16, value: &[u8]) -> Result<()> {
        self.encode(&id.to_le_bytes(), HEADER_SET_PARAM)?;
        self.push_encode(value)?;
        self.send_frame()?;
        debug!(id, len = value.len(), "set_param sent");
        Ok(())
    }

    /// Ask the peer for a parameter's value (`RequestParam`, ID only)
    pub fn request_param(&mut self, id: u16) -> Result<()> {
        self.encode_and_send(&id.to_le_bytes(), HEADER_REQUEST_PARAM)?;
        debug!(id, "request_param sent");
        Ok(())
    }

    /// Answer a parameter request (`RequestParam`, ID then value)
    pub fn reply_param(&mut self, id: u16, value: &[u8]) -> Result<()> {
        self.encode(&id.to_le_bytes(), HEADER_REQUEST_PARAM)?;
        self.push_encode(value)?;
        self.send_frame()?;
        debug!(id, len = value.len(), "parameter reply sent");
        Ok(())
    }

    /// Extract the parameter carried by the received frame
    ///
    /// The value is copied into `value` up to its capacity; any excess is
    /// silently dropped and reported through `Param::truncated`. Pass an empty
    /// buffer to read only the ID.
    ///
    /// # Errors
    ///
    /// - `Status` unless the link is `Received`
    /// - `InvalidFrame` if the frame is not a parameter frame or carries
    ///   fewer than 2 payload bytes
    /// - `InvalidFrame` or `Crc32Mismatch` if the frame fails to decode
    pub fn extract_param(&mut self, value: &mut [u8]) -> Result<Param> {
        let mut id = [0u8; PARAM_ID_LEN];
        let mut seen = 0usize;
        let mut copied = 0usize;

        let decoded = self.decode_streaming(|byte| {
            if seen < PARAM_ID_LEN {
                id[seen] = byte;
            } else if let Some(slot) = value.get_mut(copied) {
                *slot = byte;
                copied += 1;
            }
            seen += 1;
            Ok(())
        })?;

        if !matches!(decoded.header, HEADER_SET_PARAM | HEADER_REQUEST_PARAM) {
            return Err(KissError::InvalidFrame("not a parameter frame"));
        }
        if decoded.len < PARAM_ID_LEN {
            return Err(KissError::InvalidFrame("parameter frame without an ID"));
        }

        let value_len = decoded.len - PARAM_ID_LEN;
        Ok(Param {
            id: u16::from_le_bytes(id),
            len: copied,
            truncated: copied < value_len,
        })
    }

    /// Send a 16-bit command code
    pub fn send_command(&mut self, code: u16) -> Result<()> {
        self.encode_and_send(&code.to_le_bytes(), HEADER_COMMAND)
    }

    pub fn send_ack(&mut self) -> Result<()> {
        self.encode_and_send(&[], HEADER_ACK)
    }

    pub fn send_nack(&mut self) -> Result<()> {
        self.encode_and_send(&[], HEADER_NACK)
    }

    pub fn send_ping(&mut self) -> Result<()> {
        self.encode_and_send(&[], HEADER_PING)
    }

    /// Announce a new TX delay to the peer and record it locally
    ///
    /// The delay is advisory; the link never waits on its own.
    pub fn set_tx_delay(&mut self, delay: u8) -> Result<()> {
        self.encode_and_send(&[delay], HEADER_TX_DELAY)?;
        self.tx_delay = delay;
        Ok(())
    }

    /// Announce a new baud rate to the peer and record it locally
    pub fn set_speed(&mut self, baud_rate: u32) -> Result<()> {
        self.encode_and_send(&baud_rate.to_le_bytes(), HEADER_SPEED)?;
        self.speed = Some(baud_rate);
        Ok(())
    }

    /// Apply a received TX-delay or speed frame to this link's advisory fields
    ///
    /// `payload` is the decoded payload of `decoded`. Returns `false` for any
    /// other kind of frame.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFrame` if a control frame's payload is too short.
    pub fn apply_control(&mut self, decoded: &Decoded, payload: &[u8]) -> Result<bool> {
        match decoded.kind() {
            FrameKind::TxDelay => {
                let delay = *payload
                    .first()
                    .ok_or(KissError::InvalidFrame("TX delay frame without a value"))?;
                self.tx_delay = delay;
                debug!(delay, "peer set TX delay");
                Ok(true)
            }
            FrameKind::Speed => {
                let baud_rate =
                    le_u32(payload).ok_or(KissError::InvalidFrame("speed frame without a baud rate"))?;
                self.speed = Some(baud_rate);
                debug!(baud_rate, "peer set speed");
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
