//! Byte ring for the frame decoder
//!
//! Serial reads land at the write end; frames are inspected and consumed
//! at the read end without shifting memory.

use super::PACKET_LEN;

/// Fixed-capacity byte ring. `N` is the capacity in bytes.
pub struct ByteRing<const N: usize> {
    data: [u8; N],
    /// Index of the oldest buffered byte
    start: usize,
    len: usize,
}

impl<const N: usize> ByteRing<N> {
    pub fn new() -> Self {
        Self {
            data: [0u8; N],
            start: 0,
            len: 0,
        }
    }

    #[inline]
    fn physical(&self, logical: usize) -> usize {
        (self.start + logical) % N
    }

    /// Copy as much of `bytes` as fits; returns the count accepted.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let accepted = bytes.len().min(self.free());
        let end = self.physical(self.len);

        // At most two contiguous runs: up to the end of storage, then from 0
        let first = accepted.min(N - end);
        self.data[end..end + first].copy_from_slice(&bytes[..first]);
        self.data[..accepted - first].copy_from_slice(&bytes[first..accepted]);

        self.len += accepted;
        accepted
    }

    /// Drop `n` bytes from the read end (clamped to what is buffered).
    #[inline]
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len);
        self.start = self.physical(n);
        self.len -= n;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes that can still be written
    #[inline]
    pub fn free(&self) -> usize {
        N - self.len
    }

    pub fn clear(&mut self) {
        self.start = 0;
        self.len = 0;
    }

    /// Most recently written byte
    pub fn last(&self) -> Option<u8> {
        self.len.checked_sub(1).map(|i| self.data[self.physical(i)])
    }

    /// Offset of the first `first, second` byte pair from the read end.
    pub fn find_header(&self, first: u8, second: u8) -> Option<usize> {
        (1..self.len).find_map(|i| {
            let hit =
                self.data[self.physical(i - 1)] == first && self.data[self.physical(i)] == second;
            hit.then_some(i - 1)
        })
    }

    /// Copy the first [`PACKET_LEN`] bytes into `frame`.
    ///
    /// Returns false (leaving `frame` untouched) if a whole frame is not
    /// buffered yet.
    pub fn copy_frame(&self, frame: &mut [u8; PACKET_LEN]) -> bool {
        if self.len < PACKET_LEN {
            return false;
        }
        let first = PACKET_LEN.min(N - self.start);
        frame[..first].copy_from_slice(&self.data[self.start..self.start + first]);
        frame[first..].copy_from_slice(&self.data[..PACKET_LEN - first]);
        true
    }
}

impl<const N: usize> Default for ByteRing<N> {
    fn default() -> Self {
        Self::new()
    }
}
