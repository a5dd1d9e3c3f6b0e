//! Synthetic sweep generator
//!
//! Produces one 360-point sweep per call, one point per whole degree, at a
//! constant baseline range with the configured obstacle sectors. Used when
//! the sensor is disabled or the port cannot be opened.

use crate::config::SimulationConfig;
use crate::types::{LidarPoint, MAX_VALID_RANGE};
use rand::prelude::*;
use rand::rngs::SmallRng;
use rand_distr::StandardNormal;

/// Gaussian noise source with deterministic seeding
#[derive(Clone)]
pub struct NoiseGenerator {
    rng: SmallRng,
}

impl NoiseGenerator {
    /// Seed 0 draws from entropy; anything else is reproducible.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(seed)
        };
        Self { rng }
    }

    #[inline]
    pub fn gaussian(&mut self, stddev: f32) -> f32 {
        if stddev == 0.0 {
            return 0.0;
        }
        let n: f32 = self.rng.sample(StandardNormal);
        n * stddev
    }
}

/// Simulated LD-19
pub struct SimulatedSource {
    config: SimulationConfig,
    noise: NoiseGenerator,
}

impl SimulatedSource {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            config: config.clone(),
            noise: NoiseGenerator::new(config.seed),
        }
    }

    /// Noise-free range at a whole-degree bearing
    pub fn range_at(&self, degree: u16) -> f32 {
        self.config
            .obstacles
            .iter()
            .rev()
            .find(|sector| sector.contains(degree))
            .map_or(self.config.baseline_distance, |sector| sector.distance)
    }

    /// Generate one full sweep, sorted by angle
    pub fn generate(&mut self) -> Vec<LidarPoint> {
        (0..360u16)
            .map(|degree| {
                let mut distance = self.range_at(degree);
                if self.config.noise_stddev > 0.0 {
                    distance = (distance + self.noise.gaussian(self.config.noise_stddev))
                        .clamp(0.0, MAX_VALID_RANGE);
                }
                LidarPoint::new(degree as f32, distance, 0)
            })
            .collect()
    }
}
