//! # KISS Frame Encoder
//!
//! Byte-stuffs a header and payload into a fixed-capacity buffer.
//!
//! Every byte (or escape pair) is capacity-checked before it is written. The
//! first shortfall aborts with `BufferOverflow` and leaves the buffer partially
//! written; callers start over with a fresh [`encode`].

use super::crc::Crc32;
use super::protocol::*;
use crate::error::{KissError, Result};

/// Bounded append-only cursor over the link buffer
pub(crate) struct FrameWriter<'b> {
    buf: &'b mut [u8],
    len: usize,
}

impl<'b> FrameWriter<'b> {
    pub(crate) fn new(buf: &'b mut [u8], len: usize) -> Self {
        debug_assert!(len <= buf.len());
        Self { buf, len }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    fn put_raw(&mut self, byte: u8) -> Result<()> {
        if self.len >= self.buf.len() {
            return Err(KissError::BufferOverflow("frame does not fit the link buffer"));
        }
        self.buf[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Write `byte`, escaping FEND/FESC
    fn put_stuffed(&mut self, byte: u8) -> Result<()> {
        let escaped = match byte {
            FEND => TFEND,
            FESC => TFESC,
            _ => return self.put_raw(byte),
        };
        if self.len + 2 > self.buf.len() {
            return Err(KissError::BufferOverflow("escape pair does not fit the link buffer"));
        }
        self.buf[self.len] = FESC;
        self.buf[self.len + 1] = escaped;
        self.len += 2;
        Ok(())
    }
}

/// State of an encoded frame that has not been sent yet
///
/// `body_end` is the buffer index right after the last stuffed payload byte,
/// where the CRC (if any) and the terminating FEND begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingFrame {
    pub(crate) crc: Crc32,
    pub(crate) body_end: usize,
}

/// Encode a complete frame at the start of the writer
///
/// Layout: `padding × FEND | FEND | header | payload | [CRC32 LE] | FEND`,
/// with header, payload and CRC bytes stuffed.
pub(crate) fn encode(
    w: &mut FrameWriter<'_>,
    padding: usize,
    header: u8,
    payload: &[u8],
    crc32: bool,
) -> Result<PendingFrame> {
    w.len = 0;

    for _ in 0..padding {
        w.put_raw(FEND)?;
    }
    w.put_raw(FEND)?;
    w.put_stuffed(header)?;

    let mut crc = Crc32::new();
    crc.update_byte(header);

    for &byte in payload {
        w.put_stuffed(byte)?;
    }
    crc.update(payload);

    let pending = PendingFrame {
        crc,
        body_end: w.len,
    };
    finish(w, &pending, crc32)?;
    Ok(pending)
}

/// Append more payload to a pending frame
///
/// Drops the current CRC and terminator, stuffs `extra` after the existing
/// payload and re-terminates. The result is byte-identical to encoding the
/// concatenated payload in one go.
pub(crate) fn push_encode(
    w: &mut FrameWriter<'_>,
    pending: &PendingFrame,
    extra: &[u8],
    crc32: bool,
) -> Result<PendingFrame> {
    if w.len == 0 || w.buf[w.len - 1] != FEND || pending.body_end >= w.len {
        return Err(KissError::InvalidFrame("pending frame is not terminated"));
    }

    w.len = pending.body_end;
    for &byte in extra {
        w.put_stuffed(byte)?;
    }

    let mut crc = pending.crc;
    crc.update(extra);

    let extended = PendingFrame {
        crc,
        body_end: w.len,
    };
    finish(w, &extended, crc32)?;
    Ok(extended)
}

/// Write the optional CRC and the closing FEND after the body
fn finish(w: &mut FrameWriter<'_>, pending: &PendingFrame, crc32: bool) -> Result<()> {
    if crc32 {
        for byte in pending.crc.finalize().to_le_bytes() {
            w.put_stuffed(byte)?;
        }
    }
    w.put_raw(FEND)
}

/// Worst-case encoded size of a payload (every byte escaped)
///
/// # Examples
///
/// ```
/// use kiss_link::kiss::encoder::max_encoded_len;
///
/// assert_eq!(max_encoded_len(2, 0, false), 8);
/// assert_eq!(max_encoded_len(2, 0, true), 16);
/// ```
pub fn max_encoded_len(payload_len: usize, padding: usize, crc32: bool) -> usize {
    let crc = if crc32 { 2 * CRC32_LEN } else { 0 };
    padding + 1 + 2 + 2 * payload_len + crc + 1
}
