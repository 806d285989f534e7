//! # Serial Transport Module
//!
//! Blocking serial port transport for the KISS link.
//!
//! This module handles:
//! - Opening a serial port at a configured baud rate (8N1, no flow control)
//! - Writing complete frames
//! - Reading with a timeout, where a timeout means "nothing arrived yet"

use std::io::{self, Read, Write};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{KissError, Result};
use crate::transport::Transport;

/// Serial port transport
pub struct SerialTransport {
    /// Serial port handle
    port: Box<dyn tokio_serial::SerialPort>,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open a serial port for the link
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0")
    /// * `baud_rate` - Line speed
    /// * `timeout` - How long a single read waits before reporting 0 bytes
    ///
    /// # Errors
    ///
    /// Returns `Serial` if the port cannot be opened or configured
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use kiss_link::serial::SerialTransport;
    ///
    /// let port = SerialTransport::open("/dev/ttyUSB0", 115_200, Duration::from_millis(100))?;
    /// println!("Connected to: {}", port.device_path());
    /// # Ok::<(), kiss_link::error::KissError>(())
    /// ```
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        debug!("Opening serial port {} at {} baud", path, baud_rate);

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| KissError::Serial(format!("Failed to open {}: {}", path, e)))?;

        info!("Opened serial port {} at {} baud", path, baud_rate);
        Ok(Self {
            port,
            device_path: path.to_string(),
        })
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.port
            .set_baud_rate(baud_rate)
            .map_err(|e| KissError::Serial(format!("Failed to set baud rate {}: {}", baud_rate, e)))?;
        info!("Serial port {} now at {} baud", self.device_path, baud_rate);
        Ok(())
    }
}
