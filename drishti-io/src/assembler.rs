//! Sweep assembly
//!
//! Packets arrive roughly every 2-3° of rotation. A full sweep is closed when
//! a packet starts far behind where the previous one ended, which can only
//! happen when the head has passed 0°.

use crate::protocol::Ld19Packet;
use crate::types::LidarPoint;

/// Backward jump between packets that marks a new revolution, degrees
pub const WRAP_THRESHOLD_DEG: f32 = 180.0;

/// Accumulates decoded packets into complete 360° sweeps
#[derive(Debug, Default)]
pub struct SweepAssembler {
    points: Vec<LidarPoint>,
    last_end: Option<f32>,
}

impl SweepAssembler {
    pub fn new() -> Self {
        Self {
            points: Vec::with_capacity(512),
            last_end: None,
        }
    }

    /// Add a packet; returns the finished sweep when this packet starts a new one.
    ///
    /// The returned points are already sorted and deduplicated. The packet
    /// that closes a sweep becomes the first packet of the next.
    pub fn push(&mut self, packet: &Ld19Packet) -> Option<Vec<LidarPoint>> {
        let wrapped = self
            .last_end
            .is_some_and(|end| end - packet.start_angle > WRAP_THRESHOLD_DEG);

        let finished = if wrapped && !self.points.is_empty() {
            let points = std::mem::replace(&mut self.points, Vec::with_capacity(512));
            Some(finalize_sweep(points))
        } else {
            None
        };

        self.points.extend_from_slice(&packet.points);

        // A packet straddling 0° keeps its end unwrapped so the next packet,
        // starting just past 0°, still reads as a backward jump.
        self.last_end = Some(if packet.end_angle < packet.start_angle {
            packet.end_angle + 360.0
        } else {
            packet.end_angle
        });

        finished
    }

    /// Points accumulated for the sweep in progress
    pub fn pending(&self) -> usize {
        self.points.len()
    }

    /// Drop the sweep in progress
    pub fn reset(&mut self) {
        self.points.clear();
        self.last_end = None;
    }
}

/// Sort by angle and keep one point per whole degree.
///
/// Buckets are `round(angle) mod 360`; the first point of each bucket in
/// sorted order wins. The sort is stable, so ties keep arrival order.
pub fn finalize_sweep(mut points: Vec<LidarPoint>) -> Vec<LidarPoint> {
    points.sort_by(|a, b| a.angle.total_cmp(&b.angle));

    let mut seen = [false; 360];
    points.retain(|p| {
        let bucket = (p.angle.round() as i64).rem_euclid(360) as usize;
        !std::mem::replace(&mut seen[bucket], true)
    });
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::POINTS_PER_PACKET;

    fn packet(start: f32, end: f32) -> Ld19Packet {
        let frame = Ld19Packet::encode(3600, start, end, &[(1000, 50); POINTS_PER_PACKET], 0);
        Ld19Packet::decode(&frame).unwrap()
    }

    #[test]
    fn test_single_completion_on_wrap() {
        let mut assembler = SweepAssembler::new();
        let starts = [350.0, 355.0, 5.0, 10.0];
        let completions: Vec<usize> = starts
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| assembler.push(&packet(s, s + 4.0)).map(|_| i))
            .collect();

        assert_eq!(completions, vec![2]);
        assert_eq!(assembler.pending(), 2 * POINTS_PER_PACKET);
    }

    #[test]
    fn test_straddling_packet_still_triggers() {
        let mut assembler = SweepAssembler::new();
        assert!(assembler.push(&packet(340.0, 350.0)).is_none());
        assert!(assembler.push(&packet(352.0, 3.0)).is_none());
        let sweep = assembler.push(&packet(4.0, 15.0)).unwrap();

        assert_eq!(sweep.first().map(|p| p.angle.round() as i32), Some(0));
        assert!(sweep.windows(2).all(|w| w[0].angle <= w[1].angle));
    }

    #[test]
    fn test_first_packet_never_completes() {
        let mut assembler = SweepAssembler::new();
        assert!(assembler.push(&packet(5.0, 16.0)).is_none());
        assert!(assembler.push(&packet(17.0, 28.0)).is_none());
    }

    #[test]
    fn test_small_backward_jitter_ignored() {
        let mut assembler = SweepAssembler::new();
        assembler.push(&packet(100.0, 111.0));
        assert!(assembler.push(&packet(95.0, 106.0)).is_none());
    }

    #[test]
    fn test_finalize_sorts_and_dedupes() {
        let points = vec![
            LidarPoint::new(10.2, 1.0, 1),
            LidarPoint::new(3.0, 2.0, 2),
            LidarPoint::new(9.8, 3.0, 3),
            LidarPoint::new(359.7, 4.0, 4),
            LidarPoint::new(0.1, 5.0, 5),
        ];
        let sweep = finalize_sweep(points);

        let angles: Vec<f32> = sweep.iter().map(|p| p.angle).collect();
        // 359.7 rounds into bucket 0, already taken by 0.1
        assert_eq!(angles, vec![0.1, 3.0, 9.8]);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut assembler = SweepAssembler::new();
        assembler.push(&packet(300.0, 311.0));
        assembler.reset();
        assert_eq!(assembler.pending(), 0);
        assert!(assembler.push(&packet(1.0, 12.0)).is_none());
    }
}
