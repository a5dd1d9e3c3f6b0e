//! Occupancy grid mapping.
//!
//! - [`occupancy_grid`]: cell storage and the evidence update rule
//! - [`ray_tracer`]: scans to cell writes (Bresenham)
//! - [`export`]: PNG/PGM rendering

pub mod export;
pub mod occupancy_grid;
pub mod ray_tracer;

pub use export::{ROBOT_MARKER_RADIUS, save_map_image};
pub use occupancy_grid::{CellState, GridGeometry, OccupancyGrid, UNKNOWN, UpdateModel};
pub use ray_tracer::{BresenhamLine, CellWrite, RayTracer, ScanUpdate};
