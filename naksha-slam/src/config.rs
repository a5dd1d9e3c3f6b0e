//! Configuration for the Naksha node
//!
//! One TOML file with a section per subsystem:
//!
//! ```toml
//! [lidar]
//! port = "/dev/ttyUSB0"
//! scan_frequency = 10.0
//!
//! [slam]
//! map_width = 1000
//! map_resolution = 0.05
//!
//! [logging]
//! level = "info"
//!
//! [output]
//! map_path = "map.png"
//! ```
//!
//! Missing sections and keys fall back to defaults.

use crate::error::{Error, Result};
use drishti_io::LidarConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Mapper and pose tracker settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SlamConfig {
    /// Grid width in cells
    pub map_width: usize,
    /// Grid height in cells
    pub map_height: usize,
    /// Cell size in meters
    pub map_resolution: f32,
    /// Points farther than this are not integrated, meters
    pub max_range: f32,
    /// Subtracted from cells a ray passes through
    pub free_step: f32,
    /// Added to the cell a ray ends in
    pub occupied_step: f32,
    /// Fraction of the distance to 0.5 removed from every cell per scan (0 = off)
    pub decay_rate: f32,
    /// Cells at or above this are counted as occupied
    pub occupied_threshold: f32,
    /// Cells at or below this are counted as free
    pub free_threshold: f32,
    /// Poses kept in the trajectory history
    pub pose_history_capacity: usize,
}

impl Default for SlamConfig {
    fn default() -> Self {
        Self {
            map_width: 1000,
            map_height: 1000,
            map_resolution: 0.05,
            max_range: 10.0,
            free_step: 0.05,
            occupied_step: 0.1,
            decay_rate: 0.0,
            occupied_threshold: 0.6,
            free_threshold: 0.4,
            pose_history_capacity: 1000,
        }
    }
}

impl SlamConfig {
    /// Reject values the grid cannot be built with
    pub fn validate(&self) -> Result<()> {
        if self.map_width == 0 || self.map_height == 0 {
            return Err(Error::Config(format!(
                "map size must be non-zero, got {}x{}",
                self.map_width, self.map_height
            )));
        }
        if !(self.map_resolution.is_finite() && self.map_resolution > 0.0) {
            return Err(Error::Config(format!(
                "map_resolution must be positive, got {}",
                self.map_resolution
            )));
        }
        if !(0.0..=1.0).contains(&self.decay_rate) {
            return Err(Error::Config(format!(
                "decay_rate must be within [0, 1], got {}",
                self.decay_rate
            )));
        }
        if self.free_threshold > self.occupied_threshold {
            return Err(Error::Config(
                "free_threshold must not exceed occupied_threshold".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// What the node writes and reports
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Map image written on shutdown (.png or .pgm)
    pub map_path: String,
    /// Seconds between status log lines
    pub status_interval_secs: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            map_path: "map.png".to_string(),
            status_interval_secs: 1.0,
        }
    }
}

/// Top-level node configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    pub lidar: LidarConfig,
    pub slam: SlamConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

impl NodeConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use naksha_slam::config::NodeConfig;
    ///
    /// let config = NodeConfig::from_file("naksha.toml")?;
    /// # Ok::<(), naksha_slam::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.lidar.validate()?;
        self.slam.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.slam.map_width, 1000);
        assert_eq!(config.slam.map_height, 1000);
        assert_eq!(config.slam.map_resolution, 0.05);
        assert_eq!(config.slam.max_range, 10.0);
        assert_eq!(config.slam.decay_rate, 0.0);
        assert_eq!(config.lidar.baudrate, 230_400);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_serialization() {
        let toml_string = toml::to_string_pretty(&NodeConfig::default()).unwrap();

        assert!(toml_string.contains("[lidar]"));
        assert!(toml_string.contains("[slam]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("[output]"));
        assert!(toml_string.contains("map_width = 1000"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[lidar]
port = "/dev/ttyS1"
enabled = false

[slam]
map_width = 200
map_height = 100
decay_rate = 0.01

[logging]
level = "debug"
"#;

        let config: NodeConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.lidar.port, "/dev/ttyS1");
        assert!(!config.lidar.enabled);
        assert_eq!(config.slam.map_width, 200);
        assert_eq!(config.slam.map_height, 100);
        assert_eq!(config.slam.map_resolution, 0.05);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.output.map_path, "map.png");
    }

    #[test]
    fn test_file_round_trip() {
        let mut config = NodeConfig::default();
        config.slam.map_width = 320;
        config.output.map_path = "office.pgm".to_string();

        let file = NamedTempFile::new().unwrap();
        config.to_file(file.path()).unwrap();
        assert_eq!(NodeConfig::from_file(file.path()).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = NodeConfig::default();
        config.slam.map_resolution = 0.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = NodeConfig::default();
        config.slam.decay_rate = 1.5;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.lidar.scan_frequency = -1.0;
        assert!(matches!(config.validate(), Err(Error::Lidar(_))));
    }
}
