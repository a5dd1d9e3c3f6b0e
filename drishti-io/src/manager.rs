//! LiDAR acquisition manager
//!
//! Owns the acquisition thread and the shared scan state. One background
//! thread per scanning session pulls sweeps from the active [`ScanSource`]
//! and publishes each finished scan:
//!
//! 1. the current-scan slot is overwritten,
//! 2. the scan is appended to the bounded history,
//! 3. channel subscribers get a copy (never blocking),
//! 4. the registered callback runs on the acquisition thread.
//!
//! The callback must return quickly; slow consumers should use
//! [`LidarManager::subscribe`] instead. Callback errors and panics are
//! logged and counted, acquisition continues.

use crate::config::LidarConfig;
use crate::error::{Error, Result};
use crate::history::BoundedHistory;
use crate::protocol::DecoderStats;
use crate::source::ScanSource;
use crate::transport::{SerialOpener, TransportOpener};
use crate::types::LidarScan;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Pause after a failed read before trying again
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Idle pause when a read returned no complete sweep
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// How long `stop_scanning` waits for the worker
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Default cone for obstacle queries, degrees
pub const DEFAULT_CONE_ANGLE_DEG: f32 = 30.0;

/// Callback invoked with every published scan
pub type ScanCallback =
    Arc<dyn Fn(&Arc<LidarScan>) -> std::result::Result<(), String> + Send + Sync>;

/// Acquisition status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct LidarStatus {
    /// A hardware transport is currently held open
    pub connected: bool,
    pub scanning: bool,
    pub total_scans: u64,
    /// Read and decode failures seen by the acquisition loop
    pub scan_errors: u64,
    pub callback_errors: u64,
    /// Seconds since the last published scan, `None` before the first
    pub last_scan_age: Option<f64>,
    pub scan_frequency: f32,
    /// Points in the current scan (0 if none)
    pub current_points: usize,
    pub simulated: bool,
    pub decoder: DecoderStats,
}

/// State shared between the manager and its worker
struct Shared {
    running: AtomicBool,
    connected: AtomicBool,
    simulated: AtomicBool,
    scan_frequency: f32,

    current: RwLock<Option<Arc<LidarScan>>>,
    history: RwLock<BoundedHistory<Arc<LidarScan>>>,
    last_scan: RwLock<Option<Instant>>,

    callback: RwLock<Option<ScanCallback>>,
    subscribers: Mutex<Vec<Sender<Arc<LidarScan>>>>,

    total_scans: AtomicU64,
    scan_errors: AtomicU64,
    callback_errors: AtomicU64,
    decoder: Mutex<DecoderStats>,
}

impl Shared {
    fn publish(&self, scan: LidarScan) {
        let scan = Arc::new(scan);

        *self.current.write() = Some(Arc::clone(&scan));
        self.history.write().push(Arc::clone(&scan));
        *self.last_scan.write() = Some(Instant::now());

        let count = self.total_scans.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!("Published lidar scan with {} points", scan.len());

        if count % 1000 == 0 {
            let errors = self.scan_errors.load(Ordering::Relaxed);
            let crc_errors = self.decoder.lock().crc_errors;
            log::info!(
                "Lidar stats: {} scans, {} read errors, {} CRC drops",
                count,
                errors,
                crc_errors
            );
        }

        self.subscribers
            .lock()
            .retain(|tx| match tx.try_send(Arc::clone(&scan)) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });

        // Clone out so the callback never runs under the lock
        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            match catch_unwind(AssertUnwindSafe(|| callback(&scan))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.callback_errors.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Scan callback error: {}", e);
                }
                Err(_) => {
                    self.callback_errors.fetch_add(1, Ordering::Relaxed);
                    log::warn!("Scan callback panicked");
                }
            }
        }
    }
}

struct Worker {
    handle: JoinHandle<()>,
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
}

/// Manages LD-19 acquisition (real or simulated)
///
/// All methods take `&self`; wrap the manager in an `Arc` to share it
/// between the mapper and the rest of the application.
pub struct LidarManager {
    config: LidarConfig,
    opener: Option<Arc<dyn TransportOpener>>,
    shared: Arc<Shared>,
    /// Source opened ahead of the next session
    pending: Mutex<Option<ScanSource>>,
    worker: Mutex<Option<Worker>>,
}

impl LidarManager {
    /// Create a manager for the configured serial port.
    ///
    /// The port is opened immediately; if that fails (or the hardware is
    /// disabled) the manager runs in simulation.
    pub fn new(config: LidarConfig) -> Result<Self> {
        let opener = SerialOpener::new(config.port.clone(), config.baudrate, config.read_timeout());
        Self::with_opener(config, Some(Arc::new(opener)))
    }

    /// Create a manager with a custom transport opener (`None` = simulation only)
    pub fn with_opener(
        config: LidarConfig,
        opener: Option<Arc<dyn TransportOpener>>,
    ) -> Result<Self> {
        config.validate()?;

        let source = ScanSource::select(&config, opener.as_deref());
        let simulated = source.is_simulated();

        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            connected: AtomicBool::new(!simulated),
            simulated: AtomicBool::new(simulated),
            scan_frequency: config.scan_frequency,
            current: RwLock::new(None),
            history: RwLock::new(BoundedHistory::new(config.history_capacity)),
            last_scan: RwLock::new(None),
            callback: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            total_scans: AtomicU64::new(0),
            scan_errors: AtomicU64::new(0),
            callback_errors: AtomicU64::new(0),
            decoder: Mutex::new(DecoderStats::default()),
        });

        log::info!(
            "LidarManager initialized ({} mode, {} Hz)",
            if simulated { "simulated" } else { "hardware" },
            config.scan_frequency
        );

        Ok(Self {
            config,
            opener,
            shared,
            pending: Mutex::new(Some(source)),
            worker: Mutex::new(None),
        })
    }

    /// Start the acquisition thread.
    ///
    /// Returns `Ok(false)` if already scanning.
    pub fn start_scanning(&self) -> Result<bool> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(false);
        }

        let source = match self.pending.lock().take() {
            Some(source) => source,
            None => ScanSource::select(&self.config, self.opener.as_deref()),
        };
        let simulated = source.is_simulated();
        self.shared.simulated.store(simulated, Ordering::Relaxed);
        self.shared.connected.store(!simulated, Ordering::Relaxed);

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let period = self.config.scan_period();

        self.shared.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name("ld19-acquisition".to_string())
            .spawn(move || {
                // Dropped on exit, which wakes the stopping thread
                let _done = done_tx;
                acquisition_loop(&shared, source, &stop_rx, period);
                shared.connected.store(false, Ordering::Relaxed);
            });

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker {
                    handle,
                    stop_tx,
                    done_rx,
                });
                log::info!("LiDAR scanning started");
                Ok(true)
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                self.shared.connected.store(false, Ordering::Relaxed);
                Err(Error::Thread(format!("Failed to spawn lidar thread: {}", e)))
            }
        }
    }

    /// Stop the acquisition thread and release the transport.
    ///
    /// Waits up to two seconds for the worker. Returns `false` if it was not
    /// scanning.
    pub fn stop_scanning(&self) -> bool {
        let Some(worker) = self.worker.lock().take() else {
            return false;
        };

        self.shared.running.store(false, Ordering::Release);
        let _ = worker.stop_tx.try_send(());

        // Stopped from inside a scan callback: the loop exits on its own
        if worker.handle.thread().id() == thread::current().id() {
            log::info!("LiDAR scanning stopped from acquisition thread");
            return true;
        }

        match worker.done_rx.recv_timeout(STOP_TIMEOUT) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "LiDAR thread did not stop within {:?}, detaching",
                    STOP_TIMEOUT
                );
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    log::error!("LiDAR thread panicked");
                }
            }
        }

        log::info!("LiDAR scanning stopped");
        true
    }

    /// Stop scanning, drop the callback and any pre-opened transport
    pub fn shutdown(&self) {
        self.stop_scanning();
        *self.shared.callback.write() = None;
        self.shared.subscribers.lock().clear();
        if self.pending.lock().take().is_some() {
            self.shared.connected.store(false, Ordering::Relaxed);
        }
    }

    /// Register the callback for completed scans; replaces any previous one.
    pub fn set_scan_callback<F>(&self, callback: F)
    where
        F: Fn(&Arc<LidarScan>) + Send + Sync + 'static,
    {
        self.set_fallible_scan_callback(move |scan| {
            callback(scan);
            Ok::<(), String>(())
        });
    }

    /// Register a callback that may fail; errors are logged and counted.
    pub fn set_fallible_scan_callback<F, E>(&self, callback: F)
    where
        F: Fn(&Arc<LidarScan>) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: std::fmt::Display,
    {
        let callback: ScanCallback =
            Arc::new(move |scan: &Arc<LidarScan>| callback(scan).map_err(|e| e.to_string()));
        *self.shared.callback.write() = Some(callback);
    }

    /// Remove the registered callback
    pub fn clear_scan_callback(&self) {
        *self.shared.callback.write() = None;
    }

    /// Bounded channel of published scans.
    ///
    /// The acquisition thread never blocks on it: when the channel is full
    /// the scan is skipped for this subscriber.
    pub fn subscribe(&self, capacity: usize) -> Receiver<Arc<LidarScan>> {
        let (tx, rx) = bounded(capacity.max(1));
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Latest complete scan
    pub fn get_current_scan(&self) -> Option<Arc<LidarScan>> {
        self.shared.current.read().clone()
    }

    /// Scan history, oldest first
    pub fn recent_scans(&self) -> Vec<Arc<LidarScan>> {
        self.shared.history.read().to_vec()
    }

    /// Distances of valid points within `cone_angle` of `direction` in the
    /// current scan, nearest first. Empty when no scan is available.
    pub fn get_obstacles_in_direction(&self, direction: f32, cone_angle: f32) -> Vec<f32> {
        self.get_current_scan()
            .map(|scan| scan.obstacles_in_direction(direction, cone_angle))
            .unwrap_or_default()
    }

    /// Valid points of `scan` (or the current scan) as sensor-frame (x, y)
    pub fn get_scan_as_cartesian(&self, scan: Option<&LidarScan>) -> Vec<(f32, f32)> {
        match scan {
            Some(scan) => scan.to_cartesian(),
            None => self
                .get_current_scan()
                .map(|scan| scan.to_cartesian())
                .unwrap_or_default(),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn is_simulated(&self) -> bool {
        self.shared.simulated.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &LidarConfig {
        &self.config
    }

    /// Status snapshot
    pub fn status(&self) -> LidarStatus {
        let last_scan = *self.shared.last_scan.read();
        let last_scan_age = last_scan.map(|t| t.elapsed().as_secs_f64());
        let current_points = self
            .shared
            .current
            .read()
            .as_ref()
            .map_or(0, |scan| scan.len());

        LidarStatus {
            connected: self.shared.connected.load(Ordering::Relaxed),
            scanning: self.is_scanning(),
            total_scans: self.shared.total_scans.load(Ordering::Relaxed),
            scan_errors: self.shared.scan_errors.load(Ordering::Relaxed),
            callback_errors: self.shared.callback_errors.load(Ordering::Relaxed),
            last_scan_age,
            scan_frequency: self.shared.scan_frequency,
            current_points,
            simulated: self.is_simulated(),
            decoder: *self.shared.decoder.lock(),
        }
    }
}

impl Drop for LidarManager {
    fn drop(&mut self) {
        self.stop_scanning();
    }
}

/// Sleep unless a stop is requested first. Returns false on stop.
fn pause(stop_rx: &Receiver<()>, duration: Duration) -> bool {
    matches!(stop_rx.recv_timeout(duration), Err(RecvTimeoutError::Timeout))
}

fn acquisition_loop(
    shared: &Shared,
    mut source: ScanSource,
    stop_rx: &Receiver<()>,
    period: Duration,
) {
    let simulated = source.is_simulated();
    log::info!(
        "LiDAR scan loop started ({})",
        if simulated { "simulated" } else { "serial" }
    );

    while shared.running.load(Ordering::Acquire) {
        let result = source.poll();

        let stats = source.take_decoder_stats();
        if stats != DecoderStats::default() {
            shared.decoder.lock().merge(&stats);
        }

        let keep_going = match result {
            Ok(Some(points)) => {
                shared.publish(LidarScan::new(points, shared.scan_frequency));
                !simulated || pause(stop_rx, period)
            }
            Ok(None) => pause(stop_rx, IDLE_BACKOFF),
            Err(e) => {
                shared.scan_errors.fetch_add(1, Ordering::Relaxed);
                log::error!("Lidar read error: {}", e);
                pause(stop_rx, ERROR_BACKOFF)
            }
        };

        if !keep_going {
            break;
        }
    }

    log::info!("LiDAR scan loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, Transport};
    use std::sync::atomic::AtomicUsize;

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn simulated_manager() -> LidarManager {
        let config = LidarConfig {
            scan_frequency: 50.0,
            ..Default::default()
        };
        LidarManager::with_opener(config, None).unwrap()
    }

    #[test]
    fn test_simulated_scans_published() {
        let manager = simulated_manager();
        assert!(manager.is_simulated());
        assert!(manager.start_scanning().unwrap());
        assert!(!manager.start_scanning().unwrap());

        assert!(wait_for(|| manager.status().total_scans >= 2));
        let scan = manager.get_current_scan().unwrap();
        assert_eq!(scan.len(), 360);

        let ahead = manager.get_obstacles_in_direction(180.0, DEFAULT_CONE_ANGLE_DEG);
        assert_eq!(ahead.first().copied(), Some(1.0));

        assert!(manager.stop_scanning());
        assert!(!manager.stop_scanning());
        assert!(!manager.is_scanning());
    }

    #[test]
    fn test_status_before_first_scan() {
        let manager = simulated_manager();
        let status = manager.status();
        assert!(!status.scanning);
        assert!(!status.connected);
        assert!(status.simulated);
        assert_eq!(status.last_scan_age, None);
        assert_eq!(status.current_points, 0);
        assert!(manager.get_obstacles_in_direction(0.0, 30.0).is_empty());
        assert!(manager.get_scan_as_cartesian(None).is_empty());
    }

    #[test]
    fn test_callback_panic_is_contained() {
        let manager = simulated_manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        manager.set_scan_callback(move |_scan| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first scan rejected");
            }
        });

        manager.start_scanning().unwrap();
        assert!(wait_for(|| calls.load(Ordering::SeqCst) >= 3));
        manager.stop_scanning();

        let status = manager.status();
        assert_eq!(status.callback_errors, 1);
        assert!(status.total_scans >= 3);
    }

    #[test]
    fn test_fallible_callback_counts_errors() {
        let manager = simulated_manager();
        manager.set_fallible_scan_callback(|_scan| Err("busy"));
        manager.start_scanning().unwrap();
        assert!(wait_for(|| manager.status().callback_errors >= 2));
        manager.stop_scanning();
    }

    #[test]
    fn test_subscriber_never_blocks_acquisition() {
        let manager = simulated_manager();
        let rx = manager.subscribe(1);
        manager.start_scanning().unwrap();

        assert!(wait_for(|| manager.status().total_scans >= 5));
        manager.stop_scanning();
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.recv().unwrap().len(), 360);
    }

    #[test]
    fn test_read_errors_counted_and_retried() {
        let mock = MockTransport::new();
        mock.fail_reads(2);
        let handle = mock.clone();
        let opener = move || -> Result<Box<dyn Transport>> { Ok(Box::new(handle.clone())) };

        let manager =
            LidarManager::with_opener(LidarConfig::default(), Some(Arc::new(opener))).unwrap();
        assert!(!manager.is_simulated());
        assert!(manager.status().connected);

        manager.start_scanning().unwrap();
        assert!(wait_for(|| mock.read_calls() >= 4));
        manager.stop_scanning();

        let status = manager.status();
        assert_eq!(status.scan_errors, 2);
        assert!(!status.connected);
    }

    #[test]
    fn test_stop_gives_up_on_stuck_worker() {
        let manager = simulated_manager();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        manager.set_scan_callback(move |_scan| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                thread::sleep(Duration::from_secs(3));
            }
        });

        manager.start_scanning().unwrap();
        assert!(wait_for(|| calls.load(Ordering::SeqCst) >= 1));

        let started = Instant::now();
        assert!(manager.stop_scanning());
        let elapsed = started.elapsed();
        assert!(elapsed >= STOP_TIMEOUT);
        assert!(elapsed < Duration::from_secs(3));
        assert!(!manager.is_scanning());

        // The detached worker must not keep publishing once it wakes
        manager.start_scanning().unwrap();
        let total = manager.status().total_scans;
        assert!(wait_for(|| manager.status().total_scans > total));
        manager.stop_scanning();
        let total = manager.status().total_scans;
        thread::sleep(Duration::from_millis(1500));
        assert_eq!(manager.status().total_scans, total);
    }

    #[test]
    fn test_stop_from_callback() {
        let manager = Arc::new(simulated_manager());
        let weak = Arc::downgrade(&manager);
        manager.set_scan_callback(move |_scan| {
            if let Some(manager) = weak.upgrade() {
                assert!(manager.stop_scanning());
            }
        });

        manager.start_scanning().unwrap();
        assert!(wait_for(|| !manager.is_scanning()));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(manager.status().total_scans, 1);
        assert!(!manager.stop_scanning());
    }

    #[test]
    fn test_history_is_bounded() {
        let config = LidarConfig {
            scan_frequency: 200.0,
            history_capacity: 3,
            ..Default::default()
        };
        let manager = LidarManager::with_opener(config, None).unwrap();
        manager.start_scanning().unwrap();
        assert!(wait_for(|| manager.status().total_scans >= 6));
        manager.stop_scanning();

        let history = manager.recent_scans();
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }
}
