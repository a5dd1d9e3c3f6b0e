//! LD-19 wire protocol
//!
//! Frame layout (47 bytes, little-endian multi-byte fields):
//!
//! ```text
//! offset  size  field
//! 0       1     header (0x54)
//! 1       1     ver_len (0x2C: version 1, 12 points)
//! 2       2     motor speed, deg/s
//! 4       2     start angle, centidegrees
//! 6       36    12 x [distance mm (2), intensity (1)]
//! 42      2     end angle, centidegrees
//! 44      2     device timestamp, ms
//! 46      1     CRC8 over bytes 0..46
//! ```

mod crc;
mod decoder;
mod packet;
mod ring_buffer;

pub use crc::crc8;
pub use decoder::{DecoderStats, PacketDecoder, Packets};
pub use packet::{Ld19Packet, interpolate_angles};
pub use ring_buffer::ByteRing;

/// First header byte
pub const HEADER_BYTE: u8 = 0x54;

/// Second header byte (version/length)
pub const VER_LEN_BYTE: u8 = 0x2C;

/// Total frame length in bytes
pub const PACKET_LEN: usize = 47;

/// Number of measurement records per frame
pub const POINTS_PER_PACKET: usize = 12;

/// Bytes per measurement record
pub const POINT_RECORD_LEN: usize = 3;

/// Offset of the first measurement record
pub const OFFSET_POINTS: usize = 6;

/// Offset of the end angle field
pub const OFFSET_END_ANGLE: usize = 42;

/// Offset of the device timestamp field
pub const OFFSET_TIMESTAMP: usize = 44;

/// Offset of the CRC byte
pub const OFFSET_CRC: usize = 46;
