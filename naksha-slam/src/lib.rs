//! Naksha - occupancy-grid mapping on top of Drishti IO
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   slam (SlamSystem)                 │  ← Orchestration
//! └─────────────────────────────────────────────────────┘
//!            │                              │
//! ┌───────────────────────────┐  ┌──────────────────────┐
//! │         mapping/          │  │     pose_tracker     │  ← Algorithms
//! │ (grid, ray tracer, export)│  │   (dead reckoning)   │
//! └───────────────────────────┘  └──────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (pose, math)                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Scans come from [`drishti_io::LidarManager`]; [`SlamSystem`] registers
//! as its callback and folds every scan into the grid at the current pose.
//!
//! # Usage
//!
//! ```bash
//! # Simulated lidar, robot turning in place, map saved after 30 s
//! cargo run --release --bin naksha -- --simulate --duration 30 --angular 0.2
//!
//! # With custom config file
//! cargo run --release --bin naksha -- --config naksha.toml
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod mapping;
pub mod pose_tracker;
pub mod slam;

pub use config::{LoggingConfig, NodeConfig, OutputConfig, SlamConfig};
pub use core::{Point2D, Pose, normalize_angle};
pub use error::{Error, Result};
pub use mapping::{CellState, GridGeometry, OccupancyGrid, RayTracer, ScanUpdate};
pub use pose_tracker::PoseTracker;
pub use slam::{SlamStatus, SlamSystem};
