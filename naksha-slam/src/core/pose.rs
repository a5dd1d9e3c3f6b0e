//! Pose and point types.

use serde::{Deserialize, Serialize};

/// A 2D point in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate in meters
    pub x: f32,
    /// Y coordinate in meters
    pub y: f32,
}

impl Point2D {
    /// Create a new point.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point2D) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Robot pose in the map frame.
///
/// Position in meters, heading in radians (normalized to (-π, π]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub theta: f32,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    /// Estimate confidence in [0, 1]; dead reckoning never changes it
    pub confidence: f32,
}

impl Pose {
    /// Create a pose with full confidence.
    pub fn new(x: f32, y: f32, theta: f32, timestamp: f64) -> Self {
        Self {
            x,
            y,
            theta: super::math::normalize_angle(theta),
            timestamp,
            confidence: 1.0,
        }
    }

    /// Pose at the map origin facing +x.
    pub fn origin(timestamp: f64) -> Self {
        Self::new(0.0, 0.0, 0.0, timestamp)
    }

    #[inline]
    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// World point at `distance` meters along `bearing` radians, measured
    /// from the robot heading.
    #[inline]
    pub fn project(&self, distance: f32, bearing: f32) -> Point2D {
        let (sin, cos) = (self.theta + bearing).sin_cos();
        Point2D::new(self.x + distance * cos, self.y + distance * sin)
    }
}
