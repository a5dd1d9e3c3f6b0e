//! Foundation types shared by mapping and tracking.

pub mod math;
pub mod pose;

pub use math::normalize_angle;
pub use pose::{Point2D, Pose};
