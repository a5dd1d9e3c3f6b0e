//! Acquisition configuration
//!
//! Deserialized from the `[lidar]` section of the node's TOML file. Every
//! field has a default so partial files are accepted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// LD-19 acquisition settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LidarConfig {
    /// Serial port path
    pub port: String,
    /// UART baud rate
    pub baudrate: u32,
    /// Nominal sweep rate in Hz; also paces the simulated source
    pub scan_frequency: f32,
    /// When false the hardware is never opened and the simulated source is used
    pub enabled: bool,
    /// Force the simulated source even when hardware is enabled
    pub simulate: bool,
    /// Upper bound on one blocking serial read, milliseconds
    pub read_timeout_ms: u64,
    /// Completed scans kept in the history ring
    pub history_capacity: usize,
    /// Simulated source parameters
    pub simulation: SimulationConfig,
}

impl Default for LidarConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baudrate: 230_400,
            scan_frequency: 10.0,
            enabled: true,
            simulate: false,
            read_timeout_ms: 100,
            history_capacity: 100,
            simulation: SimulationConfig::default(),
        }
    }
}

impl LidarConfig {
    /// Load from a TOML file containing only the lidar settings
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: LidarConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the acquisition loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.scan_frequency.is_finite() && self.scan_frequency > 0.0) {
            return Err(Error::Config(format!(
                "scan_frequency must be positive, got {}",
                self.scan_frequency
            )));
        }
        if self.baudrate == 0 {
            return Err(Error::Config("baudrate must be non-zero".to_string()));
        }
        if self.simulation.baseline_distance <= 0.0 {
            return Err(Error::Config(
                "simulation.baseline_distance must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the hardware should be tried at all
    pub fn wants_hardware(&self) -> bool {
        self.enabled && !self.simulate
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Period between simulated sweeps
    pub fn scan_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.scan_frequency.max(0.1)))
    }
}

/// Synthetic room used when no sensor is attached
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Range reported outside every obstacle sector, meters
    pub baseline_distance: f32,
    /// Obstacle sectors, applied in order (later entries win on overlap)
    pub obstacles: Vec<ObstacleSector>,
    /// Gaussian range noise, meters (0 disables)
    pub noise_stddev: f32,
    /// RNG seed (0 = from entropy)
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            baseline_distance: 4.0,
            obstacles: vec![
                ObstacleSector::new(170, 190, 1.0),
                ObstacleSector::new(90, 90, 2.0),
                ObstacleSector::new(270, 270, 1.5),
            ],
            noise_stddev: 0.0,
            seed: 0,
        }
    }
}

/// Inclusive whole-degree range at a fixed distance
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ObstacleSector {
    pub start_deg: u16,
    pub end_deg: u16,
    pub distance: f32,
}

impl ObstacleSector {
    pub fn new(start_deg: u16, end_deg: u16, distance: f32) -> Self {
        Self {
            start_deg,
            end_deg,
            distance,
        }
    }

    /// Whether a whole-degree bearing falls inside the sector.
    ///
    /// Sectors with `end < start` wrap through 0°.
    pub fn contains(&self, degree: u16) -> bool {
        if self.start_deg <= self.end_deg {
            (self.start_deg..=self.end_deg).contains(&degree)
        } else {
            degree >= self.start_deg || degree <= self.end_deg
        }
    }
}
