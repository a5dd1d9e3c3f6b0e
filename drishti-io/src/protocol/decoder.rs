//! Incremental LD-19 frame decoder
//!
//! Bytes are fed in arbitrary chunks; complete frames come out in order.
//! Garbage between frames is skipped by scanning for the next `0x54 0x2C`
//! header. A frame that fails validation only consumes its two header bytes,
//! so a genuine header hidden inside a corrupted frame is still found.

use super::{ByteRing, HEADER_BYTE, Ld19Packet, PACKET_LEN, VER_LEN_BYTE};
use crate::error::{Error, Result};
use crate::transport::Transport;
use serde::Serialize;
use std::collections::VecDeque;

/// Ring capacity (~87 frames)
const BUFFER_CAPACITY: usize = 4096;

/// Bytes requested from the transport per read
const READ_CHUNK: usize = 512;

/// Decoder counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Frames that passed validation
    pub packets: u64,
    /// Frames dropped for CRC mismatch
    pub crc_errors: u64,
    /// Garbage runs and malformed headers skipped
    pub framing_errors: u64,
    /// Total bytes discarded while resynchronizing
    pub bytes_skipped: u64,
}

impl DecoderStats {
    /// Accumulate another set of counters
    pub fn merge(&mut self, other: &DecoderStats) {
        self.packets += other.packets;
        self.crc_errors += other.crc_errors;
        self.framing_errors += other.framing_errors;
        self.bytes_skipped += other.bytes_skipped;
    }
}

/// Stateful frame decoder
pub struct PacketDecoder {
    buffer: ByteRing<BUFFER_CAPACITY>,
    ready: VecDeque<Ld19Packet>,
    stats: DecoderStats,
}

impl PacketDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self {
            buffer: ByteRing::new(),
            ready: VecDeque::new(),
            stats: DecoderStats::default(),
        }
    }

    /// Feed raw bytes.
    ///
    /// Never drops input: when the ring fills up, complete frames are moved
    /// to an internal queue to make room.
    pub fn feed(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let taken = self.buffer.write(bytes);
            if taken == 0 {
                // Full ring without a decodable frame is pure garbage
                match self.parse_next() {
                    Some(packet) => self.ready.push_back(packet),
                    None => {
                        let stale = self.buffer.len().saturating_sub(PACKET_LEN - 1);
                        self.skip(stale);
                    }
                }
                continue;
            }
            bytes = &bytes[taken..];

            if !bytes.is_empty() {
                while let Some(packet) = self.parse_next() {
                    self.ready.push_back(packet);
                }
            }
        }
    }

    /// Read one chunk from the transport and feed it.
    ///
    /// Returns the number of bytes read (0 on timeout).
    pub fn read_from(&mut self, transport: &mut dyn Transport) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = transport.read(&mut chunk)?;
        if n > 0 {
            self.feed(&chunk[..n]);
        }
        Ok(n)
    }

    /// Next validated frame, if one is complete.
    pub fn next_packet(&mut self) -> Option<Ld19Packet> {
        self.ready.pop_front().or_else(|| self.parse_next())
    }

    /// Drain every frame currently decodable.
    ///
    /// The iterator is lazy and restartable: once it returns `None`, feeding
    /// more bytes makes further frames available.
    pub fn packets(&mut self) -> Packets<'_> {
        Packets { decoder: self }
    }

    /// Counters accumulated since construction or the last [`take_stats`](Self::take_stats)
    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Return and reset the counters
    pub fn take_stats(&mut self) -> DecoderStats {
        std::mem::take(&mut self.stats)
    }

    /// Bytes buffered but not yet consumed
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discard buffered bytes and queued frames
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.ready.clear();
    }

    fn skip(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.buffer.consume(n);
        self.stats.bytes_skipped += n as u64;
    }

    fn parse_next(&mut self) -> Option<Ld19Packet> {
        loop {
            match self.buffer.find_header(HEADER_BYTE, VER_LEN_BYTE) {
                Some(0) => {}
                Some(offset) => {
                    self.stats.framing_errors += 1;
                    self.skip(offset);
                }
                None => {
                    // Keep a trailing 0x54, it may be the start of the next header
                    let len = self.buffer.len();
                    let keep = usize::from(self.buffer.last() == Some(HEADER_BYTE));
                    if len - keep > 0 {
                        self.stats.framing_errors += 1;
                        self.skip(len - keep);
                    }
                    return None;
                }
            }

            let mut frame = [0u8; PACKET_LEN];
            if !self.buffer.copy_frame(&mut frame) {
                return None;
            }

            match Ld19Packet::decode(&frame) {
                Ok(packet) => {
                    self.buffer.consume(PACKET_LEN);
                    self.stats.packets += 1;
                    return Some(packet);
                }
                Err(Error::ChecksumError { expected, actual }) => {
                    log::debug!(
                        "LD-19 CRC mismatch (computed {:#04x}, frame {:#04x}), skipping",
                        expected,
                        actual
                    );
                    self.stats.crc_errors += 1;
                    self.skip(2);
                }
                Err(e) => {
                    log::trace!("LD-19 frame rejected: {}", e);
                    self.stats.framing_errors += 1;
                    self.skip(2);
                }
            }
        }
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Draining iterator returned by [`PacketDecoder::packets`]
pub struct Packets<'a> {
    decoder: &'a mut PacketDecoder,
}

impl Iterator for Packets<'_> {
    type Item = Ld19Packet;

    fn next(&mut self) -> Option<Self::Item> {
        self.decoder.next_packet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{OFFSET_CRC, POINTS_PER_PACKET};
    use crate::transport::MockTransport;
    use approx::assert_relative_eq;

    fn frame(start: f32, end: f32) -> [u8; PACKET_LEN] {
        Ld19Packet::encode(3600, start, end, &[(2000, 100); POINTS_PER_PACKET], 0)
    }

    #[test]
    fn test_decodes_back_to_back_frames() {
        let mut decoder = PacketDecoder::new();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&frame(0.0, 11.0));
        bytes.extend_from_slice(&frame(12.0, 23.0));
        decoder.feed(&bytes);

        let packets: Vec<_> = decoder.packets().collect();
        assert_eq!(packets.len(), 2);
        assert_relative_eq!(packets[1].start_angle, 12.0, epsilon = 1e-4);
        assert_eq!(decoder.stats().packets, 2);
    }

    #[test]
    fn test_resyncs_after_garbage() {
        let mut decoder = PacketDecoder::new();
        decoder.feed(&[0x00, 0x54, 0x13, 0xFF, 0x2C]);
        decoder.feed(&frame(0.0, 11.0));

        assert!(decoder.next_packet().is_some());
        assert!(decoder.next_packet().is_none());
        assert_eq!(decoder.stats().bytes_skipped, 5);
        assert!(decoder.stats().framing_errors >= 1);
    }

    #[test]
    fn test_split_across_feeds() {
        let mut decoder = PacketDecoder::new();
        let f = frame(100.0, 111.0);

        decoder.feed(&f[..20]);
        assert!(decoder.next_packet().is_none());
        decoder.feed(&f[20..]);
        let packet = decoder.next_packet().unwrap();
        assert_relative_eq!(packet.end_angle, 111.0, epsilon = 1e-4);
    }

    #[test]
    fn test_crc_failure_drops_frame_only() {
        let mut decoder = PacketDecoder::new();
        let mut bad = frame(20.0, 31.0);
        bad[OFFSET_CRC] ^= 0x5A;

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&frame(0.0, 11.0));
        bytes.extend_from_slice(&bad);
        bytes.extend_from_slice(&frame(40.0, 51.0));
        decoder.feed(&bytes);

        let starts: Vec<f32> = decoder.packets().map(|p| p.start_angle).collect();
        assert_eq!(starts.len(), 2);
        assert_relative_eq!(starts[0], 0.0, epsilon = 1e-4);
        assert_relative_eq!(starts[1], 40.0, epsilon = 1e-4);
        assert_eq!(decoder.stats().crc_errors, 1);
    }

    #[test]
    fn test_truncated_frame_followed_by_valid() {
        let mut decoder = PacketDecoder::new();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&frame(0.0, 11.0)[..30]);
        bytes.extend_from_slice(&frame(12.0, 23.0));
        decoder.feed(&bytes);

        let packets: Vec<_> = decoder.packets().collect();
        assert_eq!(packets.len(), 1);
        assert_relative_eq!(packets[0].start_angle, 12.0, epsilon = 1e-4);
    }

    #[test]
    fn test_large_feed_does_not_lose_frames() {
        let mut decoder = PacketDecoder::new();
        let mut bytes = Vec::new();
        for i in 0..200 {
            let start = (i as f32 * 1.8) % 360.0;
            bytes.extend_from_slice(&frame(start, start + 1.5));
        }
        decoder.feed(&bytes);
        assert_eq!(decoder.packets().count(), 200);
    }

    #[test]
    fn test_read_from_transport() {
        let transport = MockTransport::new();
        transport.inject_read(&frame(0.0, 11.0));
        let mut reader: Box<dyn Transport> = Box::new(transport.clone());

        let mut decoder = PacketDecoder::new();
        assert_eq!(decoder.read_from(reader.as_mut()).unwrap(), PACKET_LEN);
        assert!(decoder.next_packet().is_some());
        assert_eq!(decoder.read_from(reader.as_mut()).unwrap(), 0);
    }

    #[test]
    fn test_take_stats_resets() {
        let mut decoder = PacketDecoder::new();
        decoder.feed(&frame(0.0, 11.0));
        let _ = decoder.next_packet();
        assert_eq!(decoder.take_stats().packets, 1);
        assert_eq!(decoder.stats(), DecoderStats::default());
    }
}
