//! # KISS Frame Decoder
//!
//! Unstuffs one raw frame into its header and payload, verifying the trailing
//! CRC32 when enabled.
//!
//! Payload bytes are streamed to a sink as they are unstuffed. With CRC32 on,
//! a 4-byte delay line holds back the last bytes seen so the checksum is never
//! handed to the sink, and no scratch copy of the frame is needed.

use super::crc::Crc32;
use super::protocol::*;
use crate::error::{KissError, Result};

/// Header and payload size of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    /// Header byte (unstuffed)
    pub header: u8,

    /// Number of payload bytes, CRC excluded
    pub len: usize,
}

impl Decoded {
    pub fn kind(&self) -> FrameKind {
        FrameKind::from_header(self.header)
    }
}

/// Cursor yielding unstuffed bytes of one frame body
struct Unstuffer<'a> {
    raw: &'a [u8],
    pos: usize,
}

impl<'a> Unstuffer<'a> {
    /// Position the cursor after the leading run of FENDs
    fn open(raw: &'a [u8]) -> Result<Self> {
        let pos = raw.iter().take_while(|&&b| b == FEND).count();
        if pos == 0 {
            return Err(KissError::InvalidFrame("frame must start with FEND"));
        }
        Ok(Self { raw, pos })
    }

    /// Next unstuffed byte, or `None` at the terminating FEND
    fn next_byte(&mut self) -> Result<Option<u8>> {
        let byte = *self
            .raw
            .get(self.pos)
            .ok_or(KissError::InvalidFrame("missing terminating FEND"))?;
        self.pos += 1;

        match byte {
            FEND => Ok(None),
            FESC => {
                let escaped = *self
                    .raw
                    .get(self.pos)
                    .ok_or(KissError::InvalidFrame("truncated escape sequence"))?;
                self.pos += 1;
                match escaped {
                    TFEND => Ok(Some(FEND)),
                    TFESC => Ok(Some(FESC)),
                    _ => Err(KissError::InvalidFrame("invalid escape sequence")),
                }
            }
            _ => Ok(Some(byte)),
        }
    }
}

/// Holds back the trailing CRC bytes while streaming the payload
struct CrcDelayLine {
    ring: [u8; CRC32_LEN],
    held: usize,
    head: usize,
}

impl CrcDelayLine {
    fn new() -> Self {
        Self {
            ring: [0; CRC32_LEN],
            held: 0,
            head: 0,
        }
    }

    /// Push a byte; returns the byte that is now known not to be CRC
    fn push(&mut self, byte: u8) -> Option<u8> {
        if self.held < CRC32_LEN {
            self.ring[self.held] = byte;
            self.held += 1;
            return None;
        }
        let out = self.ring[self.head];
        self.ring[self.head] = byte;
        self.head = (self.head + 1) % CRC32_LEN;
        Some(out)
    }

    fn checksum(&self) -> Option<u32> {
        if self.held < CRC32_LEN {
            return None;
        }
        let mut bytes = [0u8; CRC32_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.ring[(self.head + i) % CRC32_LEN];
        }
        Some(u32::from_le_bytes(bytes))
    }
}

/// Decode one raw frame, streaming payload bytes into `sink`
///
/// Bytes after the terminating FEND are ignored. Errors from `sink` abort the
/// decode and are returned unchanged.
///
/// # Errors
///
/// - `InvalidFrame` for a missing delimiter, missing header, bad or truncated
///   escape, or a CRC-enabled frame shorter than its checksum
/// - `Crc32Mismatch` if the trailing checksum does not match header + payload
pub(crate) fn decode_with<F>(raw: &[u8], crc32: bool, mut sink: F) -> Result<Decoded>
where
    F: FnMut(u8) -> Result<()>,
{
    let mut body = Unstuffer::open(raw)?;
    let header = body
        .next_byte()?
        .ok_or(KissError::InvalidFrame("frame has no header"))?;

    let mut crc = Crc32::new();
    crc.update_byte(header);
    let mut delay = CrcDelayLine::new();
    let mut len = 0usize;

    while let Some(byte) = body.next_byte()? {
        let ready = if crc32 { delay.push(byte) } else { Some(byte) };
        if let Some(byte) = ready {
            crc.update_byte(byte);
            sink(byte)?;
            len += 1;
        }
    }

    if crc32 {
        let expected = delay
            .checksum()
            .ok_or(KissError::InvalidFrame("frame too short for CRC32"))?;
        let computed = crc.finalize();
        if expected != computed {
            return Err(KissError::Crc32Mismatch { expected, computed });
        }
    }

    Ok(Decoded { header, len })
}

/// Decode one raw frame into `out`
///
/// # Errors
///
/// As for the streaming decode, plus `BufferOverflow` if the payload does not fit `out`.
///
/// # Examples
///
/// ```
/// use kiss_link::kiss::decoder::decode_frame;
///
/// let mut out = [0u8; 8];
/// let decoded = decode_frame(&[0xC0, 0x00, 0x41, 0xDB, 0xDC, 0xC0], false, &mut out)?;
/// assert_eq!(decoded.header, 0x00);
/// assert_eq!(&out[..decoded.len], &[0x41, 0xC0]);
/// # Ok::<(), kiss_link::error::KissError>(())
/// ```
pub fn decode_frame(raw: &[u8], crc32: bool, out: &mut [u8]) -> Result<Decoded> {
    let mut n = 0usize;
    decode_with(raw, crc32, |byte| {
        let slot = out
            .get_mut(n)
            .ok_or(KissError::BufferOverflow("decoded payload does not fit the output buffer"))?;
        *slot = byte;
        n += 1;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kiss::crc::crc32;

    fn with_crc(header: u8, payload: &[u8]) -> Vec<u8> {
        let mut data = vec![header];
        data.extend_from_slice(payload);
        let crc = crc32(&data).to_le_bytes();

        let mut frame = vec![FEND, header];
        for &b in payload.iter().chain(crc.iter()) {
            match b {
                FEND => frame.extend_from_slice(&[FESC, TFEND]),
                FESC => frame.extend_from_slice(&[FESC, TFESC]),
                _ => frame.push(b),
            }
        }
        frame.push(FEND);
        frame
    }

    #[test]
    fn test_decode_plain_frame() {
        let mut out = [0u8; 16];
        let decoded = decode_frame(&[0xC0, 0x00, 0x41, 0x42, 0xC0], false, &mut out).unwrap();
        assert_eq!(decoded, Decoded { header: 0x00, len: 2 });
        assert_eq!(&out[..2], &[0x41, 0x42]);
    }

    #[test]
    fn test_decode_skips_leading_fends() {
        let mut out = [0u8; 16];
        let decoded = decode_frame(&[0xC0, 0xC0, 0xC0, 0x05, 0x01, 0xC0], false, &mut out).unwrap();
        assert_eq!(decoded.header, 0x05);
        assert_eq!(&out[..decoded.len], &[0x01]);
    }

    #[test]
    fn test_decode_unstuffs_header_and_payload() {
        let raw = [0xC0, 0xDB, 0xDD, 0xDB, 0xDC, 0xDB, 0xDD, 0xC0];
        let mut out = [0u8; 16];
        let decoded = decode_frame(&raw, false, &mut out).unwrap();
        assert_eq!(decoded.header, FESC);
        assert_eq!(&out[..decoded.len], &[FEND, FESC]);
    }

    #[test]
    fn test_decode_empty_payload() {
        let mut out = [0u8; 0];
        let decoded = decode_frame(&[0xC0, 0xA0, 0xC0], false, &mut out).unwrap();
        assert_eq!(decoded, Decoded { header: HEADER_ACK, len: 0 });
        assert_eq!(decoded.kind(), FrameKind::Ack);
    }

    #[test]
    fn test_decode_rejects_invalid_escape() {
        let mut out = [0u8; 16];
        let result = decode_frame(&[0xC0, 0x00, 0xDB, 0x41, 0xC0], false, &mut out);
        assert!(matches!(result, Err(KissError::InvalidFrame(_))));
    }

    #[test]
    fn test_decode_rejects_escape_before_terminator() {
        let mut out = [0u8; 16];
        let result = decode_frame(&[0xC0, 0x00, 0x41, 0xDB, 0xC0], false, &mut out);
        assert!(matches!(result, Err(KissError::InvalidFrame(_))));
    }

    #[test]
    fn test_decode_rejects_illegal_header_escape() {
        let mut out = [0u8; 16];
        let result = decode_frame(&[0xC0, 0xDB, 0x00, 0xC0], false, &mut out);
        assert!(matches!(result, Err(KissError::InvalidFrame(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_frame() {
        let mut out = [0u8; 16];
        let result = decode_frame(&[0xC0, 0x00, 0x41], false, &mut out);
        assert!(matches!(result, Err(KissError::InvalidFrame(_))));

        let result = decode_frame(&[0x00, 0x41, 0xC0], false, &mut out);
        assert!(matches!(result, Err(KissError::InvalidFrame(_))));

        let result = decode_frame(&[0xC0, 0xC0], false, &mut out);
        assert!(matches!(result, Err(KissError::InvalidFrame(_))));
    }

    #[test]
    fn test_decode_output_overflow() {
        let mut out = [0u8; 1];
        let result = decode_frame(&[0xC0, 0x00, 0x41, 0x42, 0xC0], false, &mut out);
        assert!(matches!(result, Err(KissError::BufferOverflow(_))));
    }

    #[test]
    fn test_decode_verifies_crc() {
        let frame = with_crc(0x00, &[0x41, 0x42]);
        let mut out = [0u8; 16];
        let decoded = decode_frame(&frame, true, &mut out).unwrap();
        assert_eq!(decoded, Decoded { header: 0x00, len: 2 });
        assert_eq!(&out[..2], &[0x41, 0x42]);
    }

    #[test]
    fn test_decode_crc_with_stuffed_bytes() {
        let frame = with_crc(HEADER_SET_PARAM, &[0xC0, 0xDB, 0x00, 0xC0]);
        let mut out = [0u8; 16];
        let decoded = decode_frame(&frame, true, &mut out).unwrap();
        assert_eq!(&out[..decoded.len], &[0xC0, 0xDB, 0x00, 0xC0]);
    }

    #[test]
    fn test_decode_crc_mismatch() {
        let mut frame = with_crc(0x00, &[0x41, 0x42]);
        frame[2] = 0x43;
        let mut out = [0u8; 16];
        let result = decode_frame(&frame, true, &mut out);
        assert!(matches!(result, Err(KissError::Crc32Mismatch { .. })));
    }

    #[test]
    fn test_decode_corruption_undetected_without_crc() {
        let mut out = [0u8; 16];
        let decoded = decode_frame(&[0xC0, 0x00, 0x43, 0x42, 0xC0], false, &mut out).unwrap();
        assert_eq!(&out[..decoded.len], &[0x43, 0x42]);
    }

    #[test]
    fn test_decode_crc_frame_too_short() {
        let mut out = [0u8; 16];
        let result = decode_frame(&[0xC0, 0x00, 0x01, 0x02, 0xC0], true, &mut out);
        assert!(matches!(result, Err(KissError::InvalidFrame(_))));
    }

    #[test]
    fn test_decode_ignores_bytes_after_terminator() {
        let mut out = [0u8; 16];
        let decoded = decode_frame(&[0xC0, 0x01, 0x02, 0xC0, 0x99, 0x98], false, &mut out).unwrap();
        assert_eq!(decoded, Decoded { header: 0x01, len: 1 });
    }
}
