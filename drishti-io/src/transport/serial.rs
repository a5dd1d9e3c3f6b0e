//! UART transport for the LD-19
//!
//! The sensor streams continuously once powered, so whatever sat in the
//! driver's input queue before the port was opened is stale and discarded.

use super::{Transport, TransportOpener};
use crate::error::Result;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// 8N1 serial link without flow control
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `path` (e.g. "/dev/ttyUSB0") at `baud_rate` (230400 for the LD-19).
    ///
    /// A read blocks for at most `read_timeout`, then reports 0 bytes.
    pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(read_timeout)
            .open()?;

        if let Err(e) = port.clear(ClearBuffer::Input) {
            log::debug!("Could not flush stale input on {}: {}", path, e);
        }
        log::info!("LD-19 serial port {} open at {} baud", path, baud_rate);

        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        match self.port.read(buffer) {
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => Ok(0),
            other => Ok(other?),
        }
    }

    // The LD-19 ignores host writes; kept for sensors sharing the trait
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let written = self.port.write(data)?;
        Ok(written)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.port.flush()?)
    }

    fn available(&mut self) -> Result<usize> {
        let queued = self.port.bytes_to_read()?;
        Ok(queued as usize)
    }
}

/// Opens [`SerialTransport`] with fixed port settings
#[derive(Debug, Clone)]
pub struct SerialOpener {
    pub path: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl SerialOpener {
    pub fn new(path: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout,
        }
    }
}

impl TransportOpener for SerialOpener {
    fn open(&self) -> Result<Box<dyn Transport>> {
        let transport = SerialTransport::open(&self.path, self.baud_rate, self.read_timeout)?;
        Ok(Box::new(transport))
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }
}
