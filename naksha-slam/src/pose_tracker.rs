//! Dead-reckoned pose from velocity commands.
//!
//! Integrates `(linear, angular)` velocity with a first-order Euler step.
//! There is no correction step, so drift accumulates without bound.

use crate::core::{Pose, normalize_angle};
use drishti_io::BoundedHistory;
use drishti_io::types::now_secs;
use std::time::Instant;

/// Open-loop pose integrator with a bounded trajectory.
#[derive(Debug)]
pub struct PoseTracker {
    pose: Pose,
    /// Wall-clock time of the previous `integrate`, `None` until the first call
    last_update: Option<Instant>,
    history: BoundedHistory<Pose>,
}

impl PoseTracker {
    /// Tracker at the origin keeping the last `history_capacity` poses.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            pose: Pose::origin(now_secs()),
            last_update: None,
            history: BoundedHistory::new(history_capacity),
        }
    }

    /// Advance using the wall-clock time since the previous call.
    ///
    /// The first call after construction or [`reset`](Self::reset) only
    /// records the time baseline.
    pub fn integrate(&mut self, linear: f32, angular: f32) {
        let now = Instant::now();
        if let Some(last) = self.last_update.replace(now) {
            let dt = now.duration_since(last).as_secs_f32();
            self.integrate_with_dt(linear, angular, dt);
        }
    }

    /// Advance by an explicit `dt` in seconds; `dt <= 0` is ignored.
    pub fn integrate_with_dt(&mut self, linear: f32, angular: f32, dt: f32) {
        if dt <= 0.0 || !dt.is_finite() {
            return;
        }

        // Heading first, then translate along the new heading
        let theta = self.pose.theta + angular * dt;
        let (sin, cos) = theta.sin_cos();
        self.pose.x += linear * cos * dt;
        self.pose.y += linear * sin * dt;
        self.pose.theta = normalize_angle(theta);
        self.pose.timestamp = now_secs();

        self.history.push(self.pose);
    }

    /// Current pose estimate
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Recorded poses, oldest first
    pub fn trajectory(&self) -> Vec<Pose> {
        self.history.to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Back to the origin with an empty history.
    pub fn reset(&mut self) {
        self.pose = Pose::origin(now_secs());
        self.last_update = None;
        self.history.clear();
    }
}
