//! # Frame Assembler
//!
//! Collects raw transport bytes into one complete FEND-delimited frame.
//!
//! Rules:
//! - bytes before the first FEND are pre-sync noise and dropped
//! - the first FEND opens the frame and is kept
//! - a FEND while only the opener is held is extra sync padding and dropped
//! - any other byte is kept verbatim (escapes are left for the decoder)
//! - a FEND after at least one body byte closes the frame
//!
//! The padding rule means an empty frame (`FEND FEND`) can never be assembled;
//! the second FEND is always taken as padding.
//!
//! Bytes that arrive after the closing FEND belong to the next frame. They are
//! parked at the tail of the buffer and fed back in on the next call.

use tracing::trace;

use super::protocol::FEND;
use crate::error::{KissError, Result};
use crate::transport::Transport;

/// Outcome of a successful assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Assembled {
    /// Length of the raw frame at the start of the buffer
    pub(crate) len: usize,

    /// Bytes of the following frame(s) parked at the end of the buffer
    pub(crate) carry: usize,
}

/// Compact `buf[start..end]` onto the frame held in `buf[..*len]`
///
/// Returns the assembly outcome once the closing FEND is seen, after moving
/// the unscanned rest of the chunk to the buffer tail.
fn scan(buf: &mut [u8], len: &mut usize, start: usize, end: usize) -> Option<Assembled> {
    let mut pos = start;
    while pos < end {
        let byte = buf[pos];
        pos += 1;

        if *len == 0 {
            if byte == FEND {
                buf[0] = FEND;
                *len = 1;
            }
            continue;
        }

        if byte == FEND {
            if *len == 1 {
                continue;
            }
            buf[*len] = FEND;
            *len += 1;

            // pos <= cap - carry, so the frame at the front is never touched
            let carry = end - pos;
            let cap = buf.len();
            buf.copy_within(pos..end, cap - carry);
            return Some(Assembled { len: *len, carry });
        }

        buf[*len] = byte;
        *len += 1;
    }
    None
}

/// Read from `transport` into `buf` until a frame is complete
///
/// `buf[..pending]` holds bytes carried over from the previous call; they are
/// scanned before any read and cost no attempt. Reads land directly in the
/// unused tail of `buf` and are compacted in place, so no extra memory is
/// needed.
///
/// # Errors
///
/// - `NoDataReceived` if `max_attempts` reads pass without a complete frame
/// - `BufferOverflow` if the frame outgrows `buf`
/// - `InvalidParams` if the transport claims more bytes than were requested
/// - any error returned by `transport.read`, unchanged
pub(crate) fn assemble<T>(
    buf: &mut [u8],
    pending: usize,
    transport: &mut T,
    max_attempts: u32,
) -> Result<Assembled>
where
    T: Transport + ?Sized,
{
    let cap = buf.len();
    let mut len = 0usize;

    if pending > 0 {
        trace!(pending, "assembler resumes carried bytes");
        if let Some(done) = scan(buf, &mut len, 0, pending) {
            return Ok(done);
        }
    }

    for attempt in 1..=max_attempts {
        if len == cap {
            return Err(KissError::BufferOverflow("incoming frame exceeds the link buffer"));
        }

        let requested = cap - len;
        let n = transport.read(&mut buf[len..])?;
        if n > requested {
            return Err(KissError::InvalidParams("transport returned more bytes than requested"));
        }
        trace!(attempt, read = n, held = len, "assembler read");

        let (start, end) = (len, len + n);
        if let Some(done) = scan(buf, &mut len, start, end) {
            return Ok(done);
        }
    }

    if len == cap {
        return Err(KissError::BufferOverflow("incoming frame exceeds the link buffer"));
    }
    Err(KissError::NoDataReceived(max_attempts))
}
