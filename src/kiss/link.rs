//! # KISS Link Instance
//!
//! Owns the caller's working buffer and a transport, and gates every operation
//! on the link state.
//!
//! State flow:
//! - `encode` moves any state to `Transmitting` (or `ErrorState`)
//! - `push_encode` requires `Transmitting`
//! - `send_frame` requires `Transmitting`, yields `Transmitted` (or `ErrorState`)
//! - `receive_frame` moves any state through `Receiving` to `Received`,
//!   `ReceivedError` or `Nothing` (nothing arrived)
//! - `decode` requires `Received`, yields `Received` (or `ReceivedError`)

use tracing::{debug, warn};

use super::assembler::assemble;
use super::decoder::{decode_with, Decoded};
use super::encoder::{self, FrameWriter, PendingFrame};
use super::protocol::*;
use crate::error::{KissError, Result};
use crate::transport::Transport;

/// Settings fixed at link initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkOptions {
    /// Advisory TX delay (units of 10 ms); never enforced by the link
    pub tx_delay: u8,

    /// FENDs written ahead of every frame (0-32)
    pub padding: usize,

    /// Append and verify a CRC32 on every frame
    pub crc32: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Nothing,
    Transmitting(PendingFrame),
    Transmitted,
    Receiving,
    Received,
    ReceivedError,
    ErrorState,
}

impl State {
    fn status(&self) -> LinkStatus {
        match self {
            State::Nothing => LinkStatus::Nothing,
            State::Transmitting(_) => LinkStatus::Transmitting,
            State::Transmitted => LinkStatus::Transmitted,
            State::Receiving => LinkStatus::Receiving,
            State::Received => LinkStatus::Received,
            State::ReceivedError => LinkStatus::ReceivedError,
            State::ErrorState => LinkStatus::ErrorState,
        }
    }
}

/// One endpoint of a KISS link
///
/// # Examples
///
/// ```
/// use kiss_link::kiss::link::{Link, LinkOptions};
/// use kiss_link::transport::LoopbackTransport;
///
/// let mut buffer = [0u8; 16];
/// let mut link = Link::new(&mut buffer, LoopbackTransport::new(), LinkOptions::default())?;
///
/// link.encode(&[0x41, 0x42], 0x00)?;
/// assert_eq!(link.frame(), &[0xC0, 0x00, 0x41, 0x42, 0xC0]);
/// link.send_frame()?;
/// # Ok::<(), kiss_link::error::KissError>(())
/// ```
#[derive(Debug)]
pub struct Link<'a, T> {
    buffer: &'a mut [u8],
    len: usize,
    state: State,
    transport: T,
    pub(super) tx_delay: u8,
    pub(super) speed: Option<u32>,
    padding: usize,
    crc32: bool,
    last_control: ControlFrame,
    /// Inbound bytes past the last received frame, kept at the buffer tail
    rx_carry: usize,
}

impl<'a, T: Transport> Link<'a, T> {
    /// Initialize a link over a caller-provided buffer
    ///
    /// # Errors
    ///
    /// - `InvalidParams` if `buffer` cannot hold even a minimal frame
    /// - `PaddingOverflow` if `options.padding` exceeds 32
    pub fn new(buffer: &'a mut [u8], transport: T, options: LinkOptions) -> Result<Self> {
        if buffer.len() < MIN_FRAME_LEN {
            return Err(KissError::InvalidParams("link buffer must hold at least 3 bytes"));
        }
        if options.padding > MAX_PADDING {
            return Err(KissError::PaddingOverflow(options.padding));
        }

        debug!(
            capacity = buffer.len(),
            padding = options.padding,
            crc32 = options.crc32,
            "KISS link initialized"
        );

        Ok(Self {
            buffer,
            len: 0,
            state: State::Nothing,
            transport,
            tx_delay: options.tx_delay,
            speed: None,
            padding: options.padding,
            crc32: options.crc32,
            last_control: ControlFrame::None,
            rx_carry: 0,
        })
    }

    /// Encode `payload` with `header` into the link buffer
    ///
    /// Any previous frame is discarded. Inbound bytes held for the next
    /// `receive_frame` are kept and reduce the space available to the frame.
    /// On `BufferOverflow` the link enters `ErrorState` and the buffer holds a
    /// partial frame.
    pub fn encode(&mut self, payload: &[u8], header: u8) -> Result<()> {
        let tx_end = self.tx_capacity();
        let mut w = FrameWriter::new(&mut self.buffer[..tx_end], 0);
        let result = encoder::encode(&mut w, self.padding, header, payload, self.crc32);
        self.len = w.len();

        match result {
            Ok(pending) => {
                self.state = State::Transmitting(pending);
                debug!(header, payload = payload.len(), frame = self.len, "frame encoded");
                Ok(())
            }
            Err(e) => {
                self.state = State::ErrorState;
                Err(e)
            }
        }
    }

    /// Append `extra` to the frame currently being built
    ///
    /// The result is identical to having encoded the whole payload at once.
    ///
    /// # Errors
    ///
    /// - `InvalidParams` if no frame is being built (`Transmitting`)
    /// - `InvalidFrame` if the buffer no longer ends with the terminator
    /// - `BufferOverflow` if the extended frame does not fit
    pub fn push_encode(&mut self, extra: &[u8]) -> Result<()> {
        let State::Transmitting(pending) = self.state else {
            return Err(KissError::InvalidParams("push_encode requires a frame being transmitted"));
        };

        let tx_end = self.tx_capacity();
        let mut w = FrameWriter::new(&mut self.buffer[..tx_end], self.len);
        let result = encoder::push_encode(&mut w, &pending, extra, self.crc32);
        self.len = w.len();

        match result {
            Ok(extended) => {
                self.state = State::Transmitting(extended);
                debug!(extra = extra.len(), frame = self.len, "frame extended");
                Ok(())
            }
            Err(e) => {
                self.state = State::ErrorState;
                Err(e)
            }
        }
    }

    /// Hand the encoded frame to the transport
    ///
    /// # Errors
    ///
    /// - `DataNotEncoded` unless a frame is `Transmitting`
    /// - any transport write error (the link enters `ErrorState`)
    pub fn send_frame(&mut self) -> Result<()> {
        if !matches!(self.state, State::Transmitting(_)) {
            return Err(KissError::DataNotEncoded(self.status()));
        }

        match self.transport.write(&self.buffer[..self.len]) {
            Ok(()) => {
                self.state = State::Transmitted;
                debug!(bytes = self.len, "frame sent");
                Ok(())
            }
            Err(e) => {
                self.state = State::ErrorState;
                warn!("transport write failed: {}", e);
                Err(e)
            }
        }
    }

    /// Encode and send in one step
    pub fn encode_and_send(&mut self, payload: &[u8], header: u8) -> Result<()> {
        self.encode(payload, header)?;
        self.send_frame()
    }

    /// Assemble one raw frame from the transport, using at most `max_attempts` reads
    ///
    /// On success the raw frame sits in the buffer with status `Received` and
    /// the control classification is reset until `decode` runs. Bytes read past
    /// the end of the frame are held and consumed first by the next call, so
    /// frames arriving back to back are all delivered.
    ///
    /// # Errors
    ///
    /// - `CallbackMissing` if the transport cannot read (state untouched)
    /// - `InvalidParams` if `max_attempts` is zero
    /// - `NoDataReceived` if no complete frame arrived (status `Nothing`)
    /// - `BufferOverflow`, `InvalidFrame`, transport errors (status `ReceivedError`)
    pub fn receive_frame(&mut self, max_attempts: u32) -> Result<()> {
        if !self.transport.readable() {
            return Err(KissError::CallbackMissing);
        }
        if max_attempts == 0 {
            return Err(KissError::InvalidParams("max_attempts must be at least 1"));
        }

        self.state = State::Receiving;
        self.len = 0;
        self.last_control = ControlFrame::None;

        let pending = std::mem::take(&mut self.rx_carry);
        let cap = self.buffer.len();
        self.buffer.copy_within(cap - pending.., 0);

        let result = match assemble(&mut self.buffer[..], pending, &mut self.transport, max_attempts) {
            Ok(done) => {
                self.rx_carry = done.carry;
                if done.len < MIN_FRAME_LEN {
                    Err(KissError::InvalidFrame("frame shorter than FEND + header + FEND"))
                } else {
                    Ok(done.len)
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(len) => {
                self.len = len;
                self.state = State::Received;
                debug!(bytes = len, carry = self.rx_carry, "frame received");
                Ok(())
            }
            Err(e @ KissError::NoDataReceived(_)) => {
                self.state = State::Nothing;
                Err(e)
            }
            Err(e) => {
                self.state = State::ReceivedError;
                warn!("frame reception failed: {}", e);
                Err(e)
            }
        }
    }

    /// Decode the received frame into `out`
    ///
    /// # Errors
    ///
    /// - `Status` unless the link is `Received`
    /// - `BufferOverflow` if the payload does not fit `out`
    /// - `InvalidFrame` or `Crc32Mismatch` for a malformed or corrupted frame
    pub fn decode(&mut self, out: &mut [u8]) -> Result<Decoded> {
        let mut n = 0usize;
        self.decode_streaming(|byte| {
            let slot = out
                .get_mut(n)
                .ok_or(KissError::BufferOverflow("decoded payload does not fit the output buffer"))?;
            *slot = byte;
            n += 1;
            Ok(())
        })
    }

    /// Receive and decode in one step
    pub fn receive_and_decode(&mut self, out: &mut [u8], max_attempts: u32) -> Result<Decoded> {
        self.receive_frame(max_attempts)?;
        self.decode(out)
    }

    /// Decode the received frame, handing payload bytes to `sink`
    pub(crate) fn decode_streaming<F>(&mut self, sink: F) -> Result<Decoded>
    where
        F: FnMut(u8) -> Result<()>,
    {
        if self.state != State::Received {
            return Err(KissError::Status(self.status()));
        }

        match decode_with(&self.buffer[..self.len], self.crc32, sink) {
            Ok(decoded) => {
                self.last_control = ControlFrame::from_header(decoded.header);
                debug!(header = decoded.header, payload = decoded.len, "frame decoded");
                Ok(decoded)
            }
            Err(e) => {
                self.state = State::ReceivedError;
                warn!("frame decode failed: {}", e);
                Err(e)
            }
        }
    }

    /// Inbound bytes already read but not yet assembled into a frame
    pub fn buffered(&self) -> usize {
        self.rx_carry
    }

    fn tx_capacity(&self) -> usize {
        self.buffer.len() - self.rx_carry
    }

    pub fn status(&self) -> LinkStatus {
        self.state.status()
    }

    /// Valid bytes currently in the buffer (encoded or received frame)
    pub fn frame(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn tx_delay(&self) -> u8 {
        self.tx_delay
    }

    /// Last baud rate announced or applied through a speed frame
    pub fn speed(&self) -> Option<u32> {
        self.speed
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    pub fn crc32_enabled(&self) -> bool {
        self.crc32
    }

    /// Classification of the last decoded frame
    pub fn last_control(&self) -> ControlFrame {
        self.last_control
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
