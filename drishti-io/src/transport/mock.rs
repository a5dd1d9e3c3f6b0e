//! In-memory transport for tests and replay

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

/// Mock transport backed by a shared byte queue.
///
/// Clones share the same queues, so a test can keep one handle to inject
/// bytes while the acquisition thread reads through another.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<Wire>>,
}

/// Both directions of the simulated link
#[derive(Default)]
struct Wire {
    to_host: VecDeque<u8>,
    from_host: Vec<u8>,
    failures_left: usize,
    reads: u64,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if the sensor had sent them
    pub fn inject_read(&self, data: &[u8]) {
        self.state.lock().to_host.extend(data);
    }

    /// Make the next `count` reads fail with an I/O error
    pub fn fail_reads(&self, count: usize) {
        self.state.lock().failures_left += count;
    }

    /// Everything the host has written so far
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().from_host.clone()
    }

    /// Bytes injected but not yet read
    pub fn pending(&self) -> usize {
        self.state.lock().to_host.len()
    }

    /// Number of read calls served so far
    pub fn read_calls(&self) -> u64 {
        self.state.lock().reads
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut wire = self.state.lock();
        wire.reads += 1;

        if wire.failures_left > 0 {
            wire.failures_left -= 1;
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "injected read failure",
            )));
        }

        let n = wire.to_host.len().min(buffer.len());
        for (slot, byte) in buffer.iter_mut().zip(wire.to_host.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.state.lock().from_host.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        Ok(self.pending())
    }
}
