//! Probability occupancy grid.
//!
//! Each cell holds an occupancy estimate in `[0, 1]`: 0.0 free, 1.0
//! occupied, 0.5 unknown. Evidence is accumulated additively and clamped,
//! so repeated observations saturate instead of overflowing.
//!
//! Storage is row-major (`index = cy * width + cx`) with the grid centered
//! on the world origin, which is where the robot starts.

use super::ray_tracer::{CellWrite, ScanUpdate};
use crate::config::SlamConfig;

/// Value of a never-observed cell
pub const UNKNOWN: f32 = 0.5;

/// Cell state for visualization and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Unknown (never observed, or evidence balanced)
    Unknown,
    /// Free space
    Free,
    /// Occupied by an obstacle
    Occupied,
}

/// Dimensions and placement of a grid.
///
/// `Copy` so scan rasterization can run against a snapshot without holding
/// the grid lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    /// Width in cells
    pub width: usize,
    /// Height in cells
    pub height: usize,
    /// Cell size in meters
    pub resolution: f32,
    /// World X coordinate of cell (0, 0)
    pub origin_x: f32,
    /// World Y coordinate of cell (0, 0)
    pub origin_y: f32,
}

impl GridGeometry {
    /// Geometry of a `width × height` grid centered on the world origin.
    pub fn centered(width: usize, height: usize, resolution: f32) -> Self {
        Self {
            width,
            height,
            resolution,
            origin_x: -(width as f32 * resolution) / 2.0,
            origin_y: -(height as f32 * resolution) / 2.0,
        }
    }

    /// Convert world coordinates to cell indices, signed.
    ///
    /// Uses floor, so points just left of or below the origin land in the
    /// neighbouring cell rather than collapsing onto it.
    #[inline]
    pub fn world_to_cell_signed(&self, x: f32, y: f32) -> (i32, i32) {
        let cx = ((x - self.origin_x) / self.resolution).floor() as i32;
        let cy = ((y - self.origin_y) / self.resolution).floor() as i32;
        (cx, cy)
    }

    /// Convert world coordinates to cell indices.
    ///
    /// Returns `None` if outside grid bounds.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let (cx, cy) = self.world_to_cell_signed(x, y);
        self.index_of(cx, cy).map(|_| (cx as usize, cy as usize))
    }

    /// Convert cell indices to world coordinates (center of cell).
    #[inline]
    pub fn cell_to_world(&self, cx: usize, cy: usize) -> (f32, f32) {
        let x = self.origin_x + (cx as f32 + 0.5) * self.resolution;
        let y = self.origin_y + (cy as f32 + 0.5) * self.resolution;
        (x, y)
    }

    /// Row-major index of a signed cell, `None` when out of bounds.
    #[inline]
    pub fn index_of(&self, cx: i32, cy: i32) -> Option<usize> {
        if cx >= 0 && cy >= 0 && (cx as usize) < self.width && (cy as usize) < self.height {
            Some(cy as usize * self.width + cx as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }
}

/// Evidence increments and classification thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateModel {
    pub free_step: f32,
    pub occupied_step: f32,
    pub free_threshold: f32,
    pub occupied_threshold: f32,
}

impl Default for UpdateModel {
    fn default() -> Self {
        Self {
            free_step: 0.05,
            occupied_step: 0.1,
            free_threshold: 0.4,
            occupied_threshold: 0.6,
        }
    }
}

/// 2D occupancy grid map.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    geometry: GridGeometry,
    model: UpdateModel,
    cells: Vec<f32>,
}

impl OccupancyGrid {
    /// Create a grid with every cell unknown.
    pub fn new(geometry: GridGeometry, model: UpdateModel) -> Self {
        Self {
            cells: vec![UNKNOWN; geometry.cell_count()],
            geometry,
            model,
        }
    }

    /// Build the grid described by a [`SlamConfig`].
    pub fn from_config(config: &SlamConfig) -> Self {
        let geometry =
            GridGeometry::centered(config.map_width, config.map_height, config.map_resolution);
        let model = UpdateModel {
            free_step: config.free_step,
            occupied_step: config.occupied_step,
            free_threshold: config.free_threshold,
            occupied_threshold: config.occupied_threshold,
        };
        Self::new(geometry, model)
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn model(&self) -> UpdateModel {
        self.model
    }

    pub fn width(&self) -> usize {
        self.geometry.width
    }

    pub fn height(&self) -> usize {
        self.geometry.height
    }

    pub fn resolution(&self) -> f32 {
        self.geometry.resolution
    }

    /// Raw cell values, row-major
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    /// Cell value, `None` when out of bounds.
    #[inline]
    pub fn get(&self, cx: usize, cy: usize) -> Option<f32> {
        if cx < self.geometry.width && cy < self.geometry.height {
            Some(self.cells[cy * self.geometry.width + cx])
        } else {
            None
        }
    }

    /// Value of the cell containing a world point.
    pub fn value_at_world(&self, x: f32, y: f32) -> Option<f32> {
        let (cx, cy) = self.geometry.world_to_cell(x, y)?;
        self.get(cx, cy)
    }

    /// Classify a cell value.
    pub fn classify(&self, value: f32) -> CellState {
        if value >= self.model.occupied_threshold {
            CellState::Occupied
        } else if value <= self.model.free_threshold {
            CellState::Free
        } else {
            CellState::Unknown
        }
    }

    /// Cell state (for visualization). Out-of-bounds cells are unknown.
    pub fn get_state(&self, cx: usize, cy: usize) -> CellState {
        self.get(cx, cy)
            .map_or(CellState::Unknown, |value| self.classify(value))
    }

    /// Apply one observation to a cell. Out-of-bounds cells are ignored.
    #[inline]
    pub fn update_cell_signed(&mut self, cx: i32, cy: i32, occupied: bool) {
        if let Some(index) = self.geometry.index_of(cx, cy) {
            self.observe(index, occupied);
        }
    }

    #[inline]
    fn observe(&mut self, index: usize, occupied: bool) {
        let cell = &mut self.cells[index];
        *cell = if occupied {
            (*cell + self.model.occupied_step).min(1.0)
        } else {
            (*cell - self.model.free_step).max(0.0)
        };
    }

    /// Apply a rasterized scan, in order.
    ///
    /// Writes rasterized against a different geometry are skipped.
    pub fn apply(&mut self, update: &ScanUpdate) {
        if update.geometry() != self.geometry {
            log::warn!("Dropping scan update rasterized for a different grid geometry");
            return;
        }
        for &CellWrite { index, occupied } in update.writes() {
            self.observe(index, occupied);
        }
    }

    /// Pull every cell toward unknown by `rate` (0 = no change, 1 = reset).
    pub fn decay(&mut self, rate: f32) {
        if rate <= 0.0 {
            return;
        }
        let rate = rate.min(1.0);
        for cell in &mut self.cells {
            *cell += (UNKNOWN - *cell) * rate;
        }
    }

    /// Reset every cell to unknown.
    pub fn clear(&mut self) {
        self.cells.fill(UNKNOWN);
    }
}
