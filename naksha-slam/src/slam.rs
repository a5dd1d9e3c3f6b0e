//! Mapper wired to the acquisition layer.
//!
//! [`SlamSystem`] registers itself as the [`LidarManager`] scan callback.
//! Every published scan is rasterized against the current dead-reckoned
//! pose and folded into the grid while mapping is enabled.
//!
//! ```text
//! LidarManager ──scan──► SlamSystem::process_scan ──► RayTracer ──► OccupancyGrid
//!                                   ▲
//!        integrate(v, w) ──► PoseTracker
//! ```

use crate::config::SlamConfig;
use crate::core::Pose;
use crate::error::Result;
use crate::mapping::{OccupancyGrid, RayTracer, ScanUpdate, save_map_image};
use crate::pose_tracker::PoseTracker;
use drishti_io::{LidarManager, LidarScan, LidarStatus};
use image::RgbImage;
use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Mapper status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SlamStatus {
    pub mapping: bool,
    pub scans_processed: u64,
    /// Seconds since the grid last changed, `None` before the first scan
    pub last_map_update_age: Option<f64>,
    pub pose: Pose,
    pub trajectory_len: usize,
    pub free_cells: usize,
    pub unknown_cells: usize,
    pub occupied_cells: usize,
    pub lidar: LidarStatus,
}

/// Occupancy-grid mapper driven by lidar scans and odometry.
///
/// Grid and pose tracker are each behind their own `RwLock`: the
/// acquisition thread writes the grid, the control loop writes the pose,
/// and readers (export, status) never block each other.
pub struct SlamSystem {
    config: SlamConfig,
    lidar: Arc<LidarManager>,
    grid: RwLock<OccupancyGrid>,
    tracker: RwLock<PoseTracker>,
    tracer: RayTracer,
    mapping: AtomicBool,
    scans_processed: AtomicU64,
    last_map_update: RwLock<Option<Instant>>,
    /// Bumped by `reset`; updates rasterized in an older epoch are dropped
    epoch: AtomicU64,
}

impl SlamSystem {
    /// Build the mapper and register it as the lidar scan callback.
    ///
    /// The callback holds only a weak reference, so dropping the returned
    /// `Arc` detaches the mapper from acquisition.
    pub fn new(config: SlamConfig, lidar: Arc<LidarManager>) -> Result<Arc<Self>> {
        config.validate()?;

        let system = Arc::new(Self {
            grid: RwLock::new(OccupancyGrid::from_config(&config)),
            tracker: RwLock::new(PoseTracker::new(config.pose_history_capacity)),
            tracer: RayTracer::new(config.max_range),
            lidar: Arc::clone(&lidar),
            mapping: AtomicBool::new(false),
            scans_processed: AtomicU64::new(0),
            last_map_update: RwLock::new(None),
            epoch: AtomicU64::new(0),
            config,
        });

        let weak = Arc::downgrade(&system);
        lidar.set_scan_callback(move |scan| {
            if let Some(system) = weak.upgrade() {
                system.process_scan(scan);
            }
        });

        log::info!(
            "SlamSystem initialized: {}x{} cells @ {} m, max range {} m",
            system.config.map_width,
            system.config.map_height,
            system.config.map_resolution,
            system.config.max_range
        );

        Ok(system)
    }

    /// Enable grid updates, starting acquisition if it is not running.
    pub fn start_mapping(&self) -> Result<()> {
        if !self.lidar.is_scanning() {
            self.lidar.start_scanning()?;
        }
        if !self.mapping.swap(true, Ordering::AcqRel) {
            log::info!("Mapping started");
        }
        Ok(())
    }

    /// Disable grid updates. Acquisition keeps running.
    pub fn stop_mapping(&self) {
        if self.mapping.swap(false, Ordering::AcqRel) {
            log::info!("Mapping stopped");
        }
    }

    pub fn is_mapping(&self) -> bool {
        self.mapping.load(Ordering::Acquire)
    }

    /// Integrate a scan at the current pose. Returns whether the grid changed.
    pub fn process_scan(&self, scan: &LidarScan) -> bool {
        let pose = self.current_pose();
        self.process_scan_at(scan, &pose)
    }

    /// Integrate a scan seen from `pose`.
    ///
    /// Rasterization runs against a geometry snapshot; the write lock is
    /// held only for decay and the cell writes. No-op while mapping is off.
    pub fn process_scan_at(&self, scan: &LidarScan, pose: &Pose) -> bool {
        if !self.is_mapping() {
            return false;
        }

        let (epoch, update) = self.rasterize(scan, pose);
        self.commit(epoch, &update)
    }

    fn rasterize(&self, scan: &LidarScan, pose: &Pose) -> (u64, ScanUpdate) {
        let epoch = self.epoch.load(Ordering::Acquire);
        let geometry = self.grid.read().geometry();
        (epoch, self.tracer.rasterize(geometry, scan, pose))
    }

    fn commit(&self, epoch: u64, update: &ScanUpdate) -> bool {
        {
            let mut grid = self.grid.write();
            if self.epoch.load(Ordering::Acquire) != epoch {
                log::debug!("Dropping scan rasterized before map reset");
                return false;
            }
            grid.decay(self.config.decay_rate);
            grid.apply(update);
        }

        let count = self.scans_processed.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_map_update.write() = Some(Instant::now());
        log::trace!(
            "Integrated scan {}: {} rays, {} cell writes",
            count,
            update.rays(),
            update.writes().len()
        );
        true
    }

    /// Advance the dead-reckoned pose using wall-clock dt.
    pub fn integrate(&self, linear: f32, angular: f32) {
        self.tracker.write().integrate(linear, angular);
    }

    /// Advance the dead-reckoned pose by an explicit dt, seconds.
    pub fn integrate_with_dt(&self, linear: f32, angular: f32, dt: f32) {
        self.tracker.write().integrate_with_dt(linear, angular, dt);
    }

    pub fn current_pose(&self) -> Pose {
        self.tracker.read().pose()
    }

    /// Pose history, oldest first
    pub fn trajectory(&self) -> Vec<Pose> {
        self.tracker.read().trajectory()
    }

    /// Read access to the grid; hold it briefly, it blocks scan integration.
    pub fn grid(&self) -> RwLockReadGuard<'_, OccupancyGrid> {
        self.grid.read()
    }

    pub fn lidar(&self) -> &Arc<LidarManager> {
        &self.lidar
    }

    pub fn config(&self) -> &SlamConfig {
        &self.config
    }

    /// Render the map, optionally marking the current pose.
    pub fn map_image(&self, add_robot_pose: bool) -> RgbImage {
        let pose = add_robot_pose.then(|| self.current_pose());
        self.grid.read().to_rgb(pose.as_ref())
    }

    /// Save the map with the current pose marked (PNG) or plain (PGM).
    pub fn save_map<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let pose = self.current_pose();
        // Snapshot so file I/O happens outside the lock
        let grid = self.grid.read().clone();
        save_map_image(&grid, Some(&pose), path)
    }

    pub fn status(&self) -> SlamStatus {
        let (free_cells, unknown_cells, occupied_cells) = self.grid.read().count_cells();
        let (pose, trajectory_len) = {
            let tracker = self.tracker.read();
            (tracker.pose(), tracker.history_len())
        };
        let last_update = *self.last_map_update.read();

        SlamStatus {
            mapping: self.is_mapping(),
            scans_processed: self.scans_processed.load(Ordering::Relaxed),
            last_map_update_age: last_update.map(|t| t.elapsed().as_secs_f64()),
            pose,
            trajectory_len,
            free_cells,
            unknown_cells,
            occupied_cells,
            lidar: self.lidar.status(),
        }
    }

    /// Clear the map and pose; mapping state is left as is.
    ///
    /// Scans still being rasterized against the old pose are discarded.
    pub fn reset(&self) {
        {
            let mut grid = self.grid.write();
            self.epoch.fetch_add(1, Ordering::AcqRel);
            grid.clear();
            self.tracker.write().reset();
            self.scans_processed.store(0, Ordering::Relaxed);
            *self.last_map_update.write() = None;
        }
        log::info!("Map and pose reset");
    }
}
