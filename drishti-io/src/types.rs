//! Lidar scan types

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shortest range the LD-19 reports reliably (exclusive), meters
pub const MIN_VALID_RANGE: f32 = 0.05;

/// Longest range the LD-19 reports reliably (exclusive), meters
pub const MAX_VALID_RANGE: f32 = 12.0;

/// Whether a range reading lies inside the open interval `(0.05, 12.0)`.
#[inline]
pub fn is_valid_range(distance: f32) -> bool {
    distance > MIN_VALID_RANGE && distance < MAX_VALID_RANGE
}

/// A single lidar measurement point
///
/// Out-of-range readings are kept with `valid == false` so consumers can
/// still inspect raw data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LidarPoint {
    /// Angle in degrees, `[0, 360)`
    pub angle: f32,
    /// Distance in meters
    pub distance: f32,
    /// Signal intensity (0-255)
    pub intensity: u8,
    /// Whether the distance lies inside the sensor's valid range
    pub valid: bool,
}

impl LidarPoint {
    /// Create a point, deriving `valid` from the distance.
    pub fn new(angle: f32, distance: f32, intensity: u8) -> Self {
        Self {
            angle,
            distance,
            intensity,
            valid: is_valid_range(distance),
        }
    }

    /// Convert to sensor-frame Cartesian coordinates (x, y) in meters
    pub fn to_cartesian(&self) -> (f32, f32) {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        (self.distance * cos, self.distance * sin)
    }
}

/// A complete 360° lidar scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LidarScan {
    /// Publication time, seconds since the Unix epoch
    pub timestamp: f64,
    /// Measurement points, sorted by angle
    pub points: Vec<LidarPoint>,
    /// Nominal scan frequency in Hz
    pub scan_frequency: f32,
    /// Number of points in `points`
    pub total_points: usize,
}

impl LidarScan {
    /// Build a scan stamped with the current wall-clock time.
    pub fn new(points: Vec<LidarPoint>, scan_frequency: f32) -> Self {
        Self {
            timestamp: now_secs(),
            total_points: points.len(),
            points,
            scan_frequency,
        }
    }

    /// Get the number of points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if scan is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over points flagged valid
    pub fn valid_points(&self) -> impl Iterator<Item = &LidarPoint> {
        self.points.iter().filter(|p| p.valid)
    }

    /// Count of valid points
    pub fn valid_count(&self) -> usize {
        self.valid_points().count()
    }

    /// Distances of valid points inside an angular cone, nearest first.
    ///
    /// `direction` and `cone_angle` are in degrees; a point is inside the
    /// cone when its shortest angular distance to `direction` is at most
    /// half the cone.
    pub fn obstacles_in_direction(&self, direction: f32, cone_angle: f32) -> Vec<f32> {
        let half_cone = cone_angle / 2.0;
        let mut distances: Vec<f32> = self
            .valid_points()
            .filter(|p| angular_distance_deg(p.angle, direction) <= half_cone)
            .map(|p| p.distance)
            .collect();
        distances.sort_by(f32::total_cmp);
        distances
    }

    /// Valid points as sensor-frame Cartesian (x, y) pairs
    pub fn to_cartesian(&self) -> Vec<(f32, f32)> {
        self.valid_points().map(LidarPoint::to_cartesian).collect()
    }
}

/// Shortest angular distance between two headings in degrees, `[0, 180]`.
pub fn angular_distance_deg(a: f32, b: f32) -> f32 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 { 360.0 - diff } else { diff }
}

/// Current wall-clock time in seconds since the Unix epoch
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_validity_boundaries() {
        assert!(!LidarPoint::new(0.0, 0.05, 0).valid);
        assert!(!LidarPoint::new(0.0, 12.0, 0).valid);
        assert!(LidarPoint::new(0.0, 0.06, 0).valid);
        assert!(LidarPoint::new(0.0, 11.9, 0).valid);
        assert!(!LidarPoint::new(0.0, 0.0, 0).valid);
    }

    #[test]
    fn test_to_cartesian() {
        let (x, y) = LidarPoint::new(90.0, 2.0, 100).to_cartesian();
        assert_relative_eq!(x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_angular_distance_wraps() {
        assert_relative_eq!(angular_distance_deg(355.0, 5.0), 10.0, epsilon = 1e-4);
        assert_relative_eq!(angular_distance_deg(5.0, 355.0), 10.0, epsilon = 1e-4);
        assert_relative_eq!(angular_distance_deg(0.0, 180.0), 180.0, epsilon = 1e-4);
    }

    #[test]
    fn test_obstacles_in_direction() {
        let points = vec![
            LidarPoint::new(350.0, 3.0, 10),
            LidarPoint::new(0.0, 2.0, 10),
            LidarPoint::new(10.0, 1.0, 10),
            LidarPoint::new(20.0, 0.5, 10),
            LidarPoint::new(5.0, 0.01, 10), // invalid
        ];
        let scan = LidarScan::new(points, 10.0);

        let obstacles = scan.obstacles_in_direction(0.0, 30.0);
        assert_eq!(obstacles, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_scan_counts() {
        let scan = LidarScan::new(
            vec![LidarPoint::new(0.0, 1.0, 0), LidarPoint::new(1.0, 20.0, 0)],
            10.0,
        );
        assert_eq!(scan.total_points, 2);
        assert_eq!(scan.valid_count(), 1);
        assert_eq!(scan.to_cartesian().len(), 1);
    }
}
