//! Transport layer for I/O abstraction

use crate::error::Result;

mod mock;
mod serial;

pub use mock::MockTransport;
pub use serial::{SerialOpener, SerialTransport};

/// Byte stream to the sensor
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 on timeout)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes
    fn flush(&mut self) -> Result<()>;

    /// Check if data is available to read
    fn available(&mut self) -> Result<usize> {
        Ok(0)
    }
}

/// Opens a fresh transport for each scanning session.
///
/// The acquisition manager drops its transport on stop and calls the opener
/// again on the next start.
pub trait TransportOpener: Send + Sync {
    /// Open the transport
    fn open(&self) -> Result<Box<dyn Transport>>;

    /// Human readable endpoint, used in logs
    fn describe(&self) -> String {
        "custom transport".to_string()
    }
}

impl<F> TransportOpener for F
where
    F: Fn() -> Result<Box<dyn Transport>> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn Transport>> {
        self()
    }
}
