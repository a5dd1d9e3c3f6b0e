//! Bresenham ray tracing for scan integration.
//!
//! When a beam returns from distance D, every cell between the robot and D
//! is evidence of free space and the cell at D is evidence of an obstacle.
//! Rasterization only needs the grid's [`GridGeometry`], so a whole scan is
//! turned into a [`ScanUpdate`] before the grid is locked; applying it is a
//! tight loop over precomputed cell indices.

use super::occupancy_grid::GridGeometry;
use crate::core::Pose;
use drishti_io::LidarScan;

/// Cells visited by Bresenham's line from `(x0, y0)` to `(x1, y1)`, both
/// endpoints included.
#[derive(Debug, Clone)]
pub struct BresenhamLine {
    x: i32,
    y: i32,
    x1: i32,
    y1: i32,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    finished: bool,
}

impl BresenhamLine {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };

        Self {
            x: x0,
            y: y0,
            x1,
            y1,
            dx,
            dy,
            sx,
            sy,
            err: dx - dy,
            finished: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = (self.x, self.y);

        if self.x == self.x1 && self.y == self.y1 {
            self.finished = true;
            return Some(result);
        }

        let e2 = 2 * self.err;

        if e2 > -self.dy {
            self.err -= self.dy;
            self.x += self.sx;
        }

        if e2 < self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }

        Some(result)
    }
}

/// One observation of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWrite {
    /// Row-major cell index
    pub index: usize,
    /// Ray endpoint (true) or pass-through (false)
    pub occupied: bool,
}

/// Ordered cell writes for one scan, bound to the geometry they were
/// rasterized against.
#[derive(Debug, Clone)]
pub struct ScanUpdate {
    geometry: GridGeometry,
    writes: Vec<CellWrite>,
    rays: usize,
}

impl ScanUpdate {
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            geometry,
            writes: Vec::new(),
            rays: 0,
        }
    }

    pub fn geometry(&self) -> GridGeometry {
        self.geometry
    }

    pub fn writes(&self) -> &[CellWrite] {
        &self.writes
    }

    /// Number of beams traced
    pub fn rays(&self) -> usize {
        self.rays
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Turns scans into cell writes.
#[derive(Debug, Clone)]
pub struct RayTracer {
    /// Points farther than this are skipped, meters
    max_range: f32,
}

impl Default for RayTracer {
    fn default() -> Self {
        Self { max_range: 10.0 }
    }
}

impl RayTracer {
    pub fn new(max_range: f32) -> Self {
        Self { max_range }
    }

    pub fn max_range(&self) -> f32 {
        self.max_range
    }

    /// Trace one beam between world points.
    ///
    /// Intermediate cells are recorded free, the terminal cell occupied.
    /// Cells outside the grid are skipped but the walk continues, so a ray
    /// leaving and re-entering the grid still marks the visible part.
    pub fn trace_ray(
        &self,
        update: &mut ScanUpdate,
        start_x: f32,
        start_y: f32,
        end_x: f32,
        end_y: f32,
    ) {
        let geometry = update.geometry;
        let (sx, sy) = geometry.world_to_cell_signed(start_x, start_y);
        let (ex, ey) = geometry.world_to_cell_signed(end_x, end_y);

        for (cx, cy) in BresenhamLine::new(sx, sy, ex, ey) {
            if let Some(index) = geometry.index_of(cx, cy) {
                update.writes.push(CellWrite {
                    index,
                    occupied: cx == ex && cy == ey,
                });
            }
        }
        update.rays += 1;
    }

    /// Rasterize every valid point of `scan` seen from `pose`.
    pub fn rasterize(&self, geometry: GridGeometry, scan: &LidarScan, pose: &Pose) -> ScanUpdate {
        let mut update = ScanUpdate::new(geometry);

        for point in scan.valid_points() {
            if point.distance > self.max_range {
                continue;
            }
            let end = pose.project(point.distance, point.angle.to_radians());
            self.trace_ray(&mut update, pose.x, pose.y, end.x, end.y);
        }

        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drishti_io::LidarPoint;

    fn geometry() -> GridGeometry {
        GridGeometry::centered(100, 100, 0.1)
    }

    #[test]
    fn test_bresenham_horizontal() {
        let cells: Vec<_> = BresenhamLine::new(0, 0, 5, 0).collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0], (0, 0));
        assert_eq!(cells[5], (5, 0));
        assert!(cells.iter().all(|&(_, y)| y == 0));
    }

    #[test]
    fn test_bresenham_diagonal() {
        let cells: Vec<_> = BresenhamLine::new(0, 0, 3, 3).collect();
        assert_eq!(cells, vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn test_bresenham_negative_direction() {
        let cells: Vec<_> = BresenhamLine::new(2, 1, -2, 1).collect();
        assert_eq!(cells, vec![(2, 1), (1, 1), (0, 1), (-1, 1), (-2, 1)]);
    }

    #[test]
    fn test_bresenham_single_cell() {
        let cells: Vec<_> = BresenhamLine::new(4, 4, 4, 4).collect();
        assert_eq!(cells, vec![(4, 4)]);
    }

    #[test]
    fn test_bresenham_steep_line_is_connected() {
        let cells: Vec<_> = BresenhamLine::new(0, 0, 2, 7).collect();
        assert_eq!(cells.len(), 8);
        assert!(cells.windows(2).all(|w| {
            (w[1].0 - w[0].0).abs() <= 1 && (w[1].1 - w[0].1).abs() <= 1
        }));
    }

    #[test]
    fn test_trace_ray_marks_endpoint_only_occupied() {
        let tracer = RayTracer::default();
        let mut update = ScanUpdate::new(geometry());
        tracer.trace_ray(&mut update, 0.0, 0.0, 0.55, 0.0);

        let writes = update.writes();
        assert_eq!(writes.len(), 6);
        assert!(writes[..5].iter().all(|w| !w.occupied));
        assert!(writes[5].occupied);
        assert_eq!(writes[5].index, 50 * 100 + 55);
    }

    #[test]
    fn test_trace_ray_skips_out_of_bounds() {
        let tracer = RayTracer::default();
        let mut update = ScanUpdate::new(geometry());
        tracer.trace_ray(&mut update, 4.75, 0.0, 5.55, 0.0);

        // Cells 97..=99 are inside; the endpoint (105) is not
        assert_eq!(update.writes().len(), 3);
        assert!(update.writes().iter().all(|w| !w.occupied));
    }

    #[test]
    fn test_rasterize_filters_points() {
        let tracer = RayTracer::new(3.0);
        let scan = LidarScan::new(
            vec![
                LidarPoint::new(0.0, 1.0, 10),
                LidarPoint::new(90.0, 0.01, 10), // invalid
                LidarPoint::new(180.0, 4.0, 10), // beyond max_range
            ],
            10.0,
        );
        let update = tracer.rasterize(geometry(), &scan, &Pose::origin(0.0));

        assert_eq!(update.rays(), 1);
        assert_eq!(update.writes().iter().filter(|w| w.occupied).count(), 1);
    }
}
