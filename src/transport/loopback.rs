//! In-memory duplex transport
//!
//! Each endpoint owns an inbox and an outbox. `pair()` crosses them so one
//! endpoint's writes become the other's reads. Queues sit behind a mutex, so
//! endpoints may live on different threads.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{Buf, BufMut, BytesMut};

use super::Transport;
use crate::error::Result;

type Queue = Arc<Mutex<BytesMut>>;

fn lock(queue: &Queue) -> Result<MutexGuard<'_, BytesMut>> {
    queue
        .lock()
        .map_err(|_| io::Error::other("loopback queue lock poisoned").into())
}

/// In-memory transport for tests and same-process endpoints
#[derive(Debug, Clone, Default)]
pub struct LoopbackTransport {
    inbox: Queue,
    outbox: Queue,
    max_chunk: Option<usize>,
}

impl LoopbackTransport {
    /// Standalone endpoint; use `feed` and `take_sent` to drive it
    pub fn new() -> Self {
        Self::default()
    }

    /// Two endpoints wired back to back
    ///
    /// # Examples
    ///
    /// ```
    /// use kiss_link::transport::{LoopbackTransport, Transport};
    ///
    /// let (mut obc, mut eps) = LoopbackTransport::pair();
    /// obc.write(&[0xC0, 0x80, 0xC0])?;
    ///
    /// let mut buf = [0u8; 8];
    /// assert_eq!(eps.read(&mut buf)?, 3);
    /// # Ok::<(), kiss_link::error::KissError>(())
    /// ```
    pub fn pair() -> (Self, Self) {
        let a_to_b = Queue::default();
        let b_to_a = Queue::default();
        let a = Self {
            inbox: b_to_a.clone(),
            outbox: a_to_b.clone(),
            max_chunk: None,
        };
        let b = Self {
            inbox: a_to_b,
            outbox: b_to_a,
            max_chunk: None,
        };
        (a, b)
    }

    /// Limit every read to at most `max_chunk` bytes (fragmented delivery)
    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = Some(max_chunk);
        self
    }

    /// Queue raw bytes for this endpoint to read
    pub fn feed(&self, data: &[u8]) -> Result<()> {
        lock(&self.inbox)?.put_slice(data);
        Ok(())
    }

    /// Drain everything this endpoint has written
    pub fn take_sent(&self) -> Result<Vec<u8>> {
        let mut outbox = lock(&self.outbox)?;
        let len = outbox.len();
        Ok(outbox.split_to(len).to_vec())
    }

    /// Bytes waiting to be read
    pub fn pending(&self) -> Result<usize> {
        Ok(lock(&self.inbox)?.len())
    }
}

impl Transport for LoopbackTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        lock(&self.outbox)?.put_slice(data);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inbox = lock(&self.inbox)?;
        let mut n = buf.len().min(inbox.len());
        if let Some(max_chunk) = self.max_chunk {
            n = n.min(max_chunk);
        }
        inbox.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}
