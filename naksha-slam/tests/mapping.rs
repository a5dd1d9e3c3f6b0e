//! Mapping Pipeline Tests
//!
//! Grid, ray tracer and export exercised together through the public API,
//! without the acquisition thread.
//!
//! Run with: `cargo test --test mapping`

use drishti_io::simulation::SimulatedSource;
use drishti_io::{LidarPoint, LidarScan, SimulationConfig};
use naksha_slam::mapping::{
    BresenhamLine, CellState, GridGeometry, OccupancyGrid, RayTracer, UNKNOWN, UpdateModel,
    save_map_image,
};
use naksha_slam::{NodeConfig, Pose};
use tempfile::tempdir;

fn room_grid() -> OccupancyGrid {
    OccupancyGrid::new(GridGeometry::centered(200, 200, 0.05), UpdateModel::default())
}

fn simulated_scan() -> LidarScan {
    let config = SimulationConfig {
        noise_stddev: 0.0,
        ..SimulationConfig::default()
    };
    LidarScan::new(SimulatedSource::new(&config).generate(), 10.0)
}

#[test]
fn test_simulated_room_integration() {
    let mut grid = room_grid();
    let tracer = RayTracer::new(10.0);
    let pose = Pose::origin(0.0);

    let update = tracer.rasterize(grid.geometry(), &simulated_scan(), &pose);
    assert_eq!(update.rays(), 360);
    grid.apply(&update);

    // 4 m wall straight ahead, free space on the way
    assert!(grid.value_at_world(4.0, 0.0).unwrap() > UNKNOWN);
    assert!(grid.value_at_world(2.0, 0.0).unwrap() < UNKNOWN);

    // 1 m obstacle behind the robot hides everything past it
    assert!(grid.value_at_world(-1.0, 0.0).unwrap() > UNKNOWN);
    assert_eq!(grid.value_at_world(-2.0, 0.0), Some(UNKNOWN));
}

#[test]
fn test_repeated_scans_saturate() {
    let mut grid = room_grid();
    let tracer = RayTracer::default();
    let scan = LidarScan::new(vec![LidarPoint::new(0.0, 2.0, 100)], 10.0);
    let pose = Pose::origin(0.0);

    for _ in 0..30 {
        let update = tracer.rasterize(grid.geometry(), &scan, &pose);
        grid.apply(&update);
    }

    let (cx, cy) = grid.geometry().world_to_cell(2.0, 0.0).unwrap();
    assert_eq!(grid.get(cx, cy), Some(1.0));
    assert_eq!(grid.get_state(cx, cy), CellState::Occupied);

    let (fx, fy) = grid.geometry().world_to_cell(1.0, 0.0).unwrap();
    assert_eq!(grid.get(fx, fy), Some(0.0));
    assert_eq!(grid.get_state(fx, fy), CellState::Free);
}

#[test]
fn test_update_for_other_geometry_ignored() {
    let mut grid = room_grid();
    let other = GridGeometry::centered(50, 50, 0.1);
    let update = RayTracer::default().rasterize(other, &simulated_scan(), &Pose::origin(0.0));
    assert!(!update.is_empty());

    grid.apply(&update);
    assert!(grid.cells().iter().all(|&v| v == UNKNOWN));
}

#[test]
fn test_bresenham_endpoints_inclusive() {
    for &(x0, y0, x1, y1) in &[(0, 0, 7, 3), (5, 5, -2, 9), (-3, -3, -3, 4), (2, 8, 9, 1)] {
        let cells: Vec<_> = BresenhamLine::new(x0, y0, x1, y1).collect();
        let expected = (x1 - x0).abs().max((y1 - y0).abs()) as usize + 1;
        assert_eq!(cells.len(), expected);
        assert_eq!(cells.first(), Some(&(x0, y0)));
        assert_eq!(cells.last(), Some(&(x1, y1)));
    }
}

#[test]
fn test_export_after_mapping() {
    let mut grid = room_grid();
    let update =
        RayTracer::default().rasterize(grid.geometry(), &simulated_scan(), &Pose::origin(0.0));
    grid.apply(&update);

    let (free, unknown, occupied) = grid.count_cells();
    assert!(free > 0 && occupied > 0);
    assert_eq!(free + unknown + occupied, 200 * 200);

    let dir = tempdir().unwrap();
    let png = dir.path().join("room.png");
    save_map_image(&grid, Some(&Pose::origin(0.0)), &png).unwrap();

    let image = image::open(&png).unwrap().to_rgb8();
    assert_eq!((image.width(), image.height()), (200, 200));
    // Robot marker at the grid center
    assert_eq!(image.get_pixel(100, 99).0, [255, 0, 0]);
    // Free cell 2 m ahead: +x is to the right, row unchanged
    let [r, g, b] = image.get_pixel(140, 99).0;
    assert!(r > 128 && r == g && g == b);
    // Wall 4 m ahead is darker than unknown
    assert!(image.get_pixel(180, 99).0[0] < 128);

    let pgm = dir.path().join("room.pgm");
    save_map_image(&grid, None, &pgm).unwrap();
    let bytes = std::fs::read(&pgm).unwrap();
    assert!(bytes.starts_with(b"P5\n200 200\n255\n"));
}

#[test]
fn test_node_config_builds_grid() {
    let mut config = NodeConfig::default();
    config.slam.map_width = 64;
    config.slam.map_height = 32;
    config.slam.map_resolution = 0.25;

    let grid = OccupancyGrid::from_config(&config.slam);
    assert_eq!((grid.width(), grid.height()), (64, 32));
    assert_eq!(grid.geometry().world_to_cell(0.0, 0.0), Some((32, 16)));
}
