//! LD-19 frame decoding and encoding

use super::{
    HEADER_BYTE, OFFSET_CRC, OFFSET_END_ANGLE, OFFSET_POINTS, OFFSET_TIMESTAMP, PACKET_LEN,
    POINT_RECORD_LEN, POINTS_PER_PACKET, VER_LEN_BYTE, crc8,
};
use crate::error::{Error, Result};
use crate::types::LidarPoint;

/// One decoded 12-point frame
#[derive(Debug, Clone, PartialEq)]
pub struct Ld19Packet {
    /// Rotation speed in deg/s (informational)
    pub speed: u16,
    /// Angle of the first sample, degrees
    pub start_angle: f32,
    /// Angle of the last sample, degrees
    pub end_angle: f32,
    /// Device timestamp in ms, wraps at 30000
    pub timestamp: u16,
    /// Samples in acquisition order
    pub points: [LidarPoint; POINTS_PER_PACKET],
}

#[inline]
fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Evenly spaced sample angles from `start` to `end` (degrees).
///
/// When `end < start` the sweep crossed 0°, so 360° is added to the span.
/// Results are reduced to `[0, 360)`.
pub fn interpolate_angles(start: f32, end: f32) -> [f32; POINTS_PER_PACKET] {
    let mut span = end - start;
    if span < 0.0 {
        span += 360.0;
    }
    let step = span / (POINTS_PER_PACKET - 1) as f32;

    let mut angles = [0.0f32; POINTS_PER_PACKET];
    for (i, angle) in angles.iter_mut().enumerate() {
        *angle = (start + i as f32 * step).rem_euclid(360.0);
    }
    angles
}

impl Ld19Packet {
    /// Decode a frame from the first [`PACKET_LEN`] bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PACKET_LEN {
            return Err(Error::ShortPacket {
                expected: PACKET_LEN,
                actual: bytes.len(),
            });
        }
        if bytes[0] != HEADER_BYTE || bytes[1] != VER_LEN_BYTE {
            return Err(Error::InvalidHeader(bytes[0], bytes[1]));
        }

        let expected = crc8(&bytes[..OFFSET_CRC]);
        let actual = bytes[OFFSET_CRC];
        if expected != actual {
            return Err(Error::ChecksumError { expected, actual });
        }

        let speed = read_u16_le(bytes, 2);
        let start_angle = read_u16_le(bytes, 4) as f32 / 100.0;
        let end_angle = read_u16_le(bytes, OFFSET_END_ANGLE) as f32 / 100.0;
        let timestamp = read_u16_le(bytes, OFFSET_TIMESTAMP);

        let angles = interpolate_angles(start_angle, end_angle);
        let points = std::array::from_fn(|i| {
            let offset = OFFSET_POINTS + i * POINT_RECORD_LEN;
            let distance_mm = read_u16_le(bytes, offset);
            let intensity = bytes[offset + 2];
            LidarPoint::new(angles[i], distance_mm as f32 / 1000.0, intensity)
        });

        Ok(Self {
            speed,
            start_angle,
            end_angle,
            timestamp,
            points,
        })
    }

    /// Build a well-formed frame from raw fields.
    ///
    /// Angles are in degrees and distances in millimeters, exactly as they
    /// travel on the wire. Used by replay tooling and tests.
    pub fn encode(
        speed: u16,
        start_angle: f32,
        end_angle: f32,
        samples: &[(u16, u8); POINTS_PER_PACKET],
        timestamp: u16,
    ) -> [u8; PACKET_LEN] {
        let mut frame = [0u8; PACKET_LEN];
        frame[0] = HEADER_BYTE;
        frame[1] = VER_LEN_BYTE;
        frame[2..4].copy_from_slice(&speed.to_le_bytes());
        frame[4..6].copy_from_slice(&centidegrees(start_angle).to_le_bytes());
        for (i, (distance_mm, intensity)) in samples.iter().enumerate() {
            let offset = OFFSET_POINTS + i * POINT_RECORD_LEN;
            frame[offset..offset + 2].copy_from_slice(&distance_mm.to_le_bytes());
            frame[offset + 2] = *intensity;
        }
        frame[OFFSET_END_ANGLE..OFFSET_END_ANGLE + 2]
            .copy_from_slice(&centidegrees(end_angle).to_le_bytes());
        frame[OFFSET_TIMESTAMP..OFFSET_TIMESTAMP + 2].copy_from_slice(&timestamp.to_le_bytes());
        frame[OFFSET_CRC] = crc8(&frame[..OFFSET_CRC]);
        frame
    }
}

#[inline]
fn centidegrees(angle: f32) -> u16 {
    (angle.rem_euclid(360.0) * 100.0).round() as u16
}
