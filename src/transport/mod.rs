//! # Transport Module
//!
//! Byte transports the link writes frames to and reads raw bytes from.
//!
//! This module handles:
//! - The `Transport` trait (blocking write/read contract)
//! - An in-memory duplex loopback for pairing two endpoints
//! - A write-only adapter for sinks such as files
//!
//! The serial port transport lives in [`crate::serial`].

pub mod loopback;

use std::io;

use crate::error::{KissError, Result};

pub use loopback::LoopbackTransport;

/// Blocking byte transport driven by a link
///
/// Any state the transport needs (file handle, port, queue) lives in the
/// implementing type itself.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Transmit exactly `data.len()` bytes
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Fill up to `buf.len()` bytes and return how many were produced
    ///
    /// Returning `Ok(0)` means nothing has arrived yet; it is not an error.
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(KissError::CallbackMissing)
    }

    /// Whether `read` is implemented; links refuse to receive otherwise
    fn readable(&self) -> bool {
        true
    }

    /// Retune the line speed after a speed change
    ///
    /// Transports without a line speed accept any rate and do nothing.
    fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn readable(&self) -> bool {
        (**self).readable()
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        (**self).set_baud_rate(baud_rate)
    }
}

/// Transmit-only transport over any `std::io::Write`
///
/// # Examples
///
/// ```
/// use kiss_link::transport::{Transport, WriteOnly};
///
/// let mut sink = WriteOnly::new(Vec::new());
/// sink.write(&[0xC0, 0x00, 0xC0])?;
/// assert!(!sink.readable());
/// assert_eq!(sink.into_inner(), vec![0xC0, 0x00, 0xC0]);
/// # Ok::<(), kiss_link::error::KissError>(())
/// ```
#[derive(Debug)]
pub struct WriteOnly<W> {
    inner: W,
}

impl<W: io::Write> WriteOnly<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: io::Write> Transport for WriteOnly<W> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        Ok(())
    }

    fn readable(&self) -> bool {
        false
    }
}
