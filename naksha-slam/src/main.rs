//! Naksha node: LD-19 acquisition feeding the occupancy-grid mapper.
//!
//! Drives the pose tracker from a constant-velocity odometry loop, logs
//! status periodically and writes the map image on exit (Ctrl-C or
//! `--duration`).

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use drishti_io::LidarManager;
use naksha_slam::{NodeConfig, SlamSystem};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML); defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the simulated lidar even if a port is configured
    #[arg(short, long)]
    simulate: bool,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Map image path (.png or .pgm), overrides the config
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Forward velocity fed to the pose tracker, m/s
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    linear: f32,

    /// Angular velocity fed to the pose tracker, rad/s
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    angular: f32,

    /// Odometry updates per second
    #[arg(long, default_value_t = 20.0)]
    odom_rate: f32,
}

fn load_config(args: &Args) -> Result<NodeConfig, naksha_slam::Error> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::from_file(path)?,
        None => NodeConfig::default(),
    };
    if args.simulate {
        config.lidar.simulate = true;
    }
    if let Some(output) = &args.output {
        config.output.map_path = output.display().to_string();
    }
    Ok(config)
}

/// Odometry period and status interval; rejects rates and intervals that
/// do not fit a `Duration`.
fn loop_periods(
    odom_rate: f32,
    status_interval_secs: f32,
) -> Result<(Duration, Duration), Box<dyn std::error::Error>> {
    if !(odom_rate.is_finite() && odom_rate > 0.0) {
        return Err(format!("--odom-rate must be positive, got {}", odom_rate).into());
    }
    let odom_period = Duration::try_from_secs_f32(1.0 / odom_rate)
        .map_err(|e| format!("--odom-rate {} is out of range: {}", odom_rate, e))?;
    let interval_secs = status_interval_secs.max(0.1);
    let status_interval = Duration::try_from_secs_f32(interval_secs)
        .map_err(|e| format!("status interval {} s is out of range: {}", interval_secs, e))?;
    Ok((odom_period, status_interval))
}

fn main() {
    let args = Args::parse();

    // Logging needs the configured level, so config errors go to stderr
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "[{}] {} - {}",
            record.level(),
            record.target(),
            record.args()
        )
    })
    .init();

    log::info!("naksha starting");
    log::info!(
        "  LiDAR: {} @ {} baud{}",
        config.lidar.port,
        config.lidar.baudrate,
        if config.lidar.wants_hardware() {
            ""
        } else {
            " (simulated)"
        }
    );
    log::info!(
        "  Map: {}x{} @ {} m, output {}",
        config.slam.map_width,
        config.slam.map_height,
        config.slam.map_resolution,
        config.output.map_path
    );

    // Setup signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    }) {
        log::warn!("Failed to install Ctrl-C handler: {}", e);
    }

    if let Err(e) = run(&config, &args, &running) {
        log::error!("Node error: {}", e);
        std::process::exit(1);
    }

    log::info!("naksha shutdown complete");
}

fn run(
    config: &NodeConfig,
    args: &Args,
    running: &AtomicBool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (odom_period, status_interval) =
        loop_periods(args.odom_rate, config.output.status_interval_secs)?;
    let deadline = args
        .duration
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .and_then(|d| Instant::now().checked_add(d));

    let lidar = Arc::new(LidarManager::new(config.lidar.clone())?);
    let slam = SlamSystem::new(config.slam.clone(), Arc::clone(&lidar))?;
    slam.start_mapping()?;

    log::info!(
        "Odometry: v = {} m/s, w = {} rad/s at {} Hz",
        args.linear,
        args.angular,
        args.odom_rate
    );

    let mut last_status = Instant::now();
    while running.load(Ordering::Relaxed) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("Duration elapsed");
            break;
        }

        slam.integrate(args.linear, args.angular);

        if last_status.elapsed() >= status_interval {
            last_status = Instant::now();
            let status = slam.status();
            log::info!(
                "Status: {} scans mapped ({} received, {} errors), pose ({:.2}, {:.2}, {:.1}°), cells {} free / {} occupied",
                status.scans_processed,
                status.lidar.total_scans,
                status.lidar.scan_errors,
                status.pose.x,
                status.pose.y,
                status.pose.theta.to_degrees(),
                status.free_cells,
                status.occupied_cells
            );
        }

        thread::sleep(odom_period);
    }

    slam.stop_mapping();
    lidar.shutdown();

    slam.save_map(&config.output.map_path)?;
    let status = slam.status();
    log::info!(
        "Final map: {} scans, {} free / {} unknown / {} occupied cells",
        status.scans_processed,
        status.free_cells,
        status.unknown_cells,
        status.occupied_cells
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_loop_periods() {
        let (odom, status) = loop_periods(20.0, 5.0).unwrap();
        assert_relative_eq!(odom.as_secs_f32(), 0.05, epsilon = 1e-6);
        assert_eq!(status, Duration::from_secs(5));

        // Interval is floored at 100 ms
        let (_, status) = loop_periods(20.0, 0.0).unwrap();
        assert_relative_eq!(status.as_secs_f32(), 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_loop_periods_rejects_out_of_range() {
        assert!(loop_periods(0.0, 5.0).is_err());
        assert!(loop_periods(f32::NAN, 5.0).is_err());
        assert!(loop_periods(1e-30, 5.0).is_err());
        assert!(loop_periods(20.0, f32::INFINITY).is_err());
    }
}
