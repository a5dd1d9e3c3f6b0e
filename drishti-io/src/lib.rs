//! Drishti IO - LD-19 LiDAR acquisition
//!
//! ```text
//! serial bytes ─► PacketDecoder ─► SweepAssembler ─► LidarManager ─► callback / subscribers
//!                                                        ▲
//!                                  SimulatedSource ──────┘ (no hardware)
//! ```
//!
//! - [`transport`]: byte stream abstraction (serial port, in-memory mock)
//! - [`protocol`]: 47-byte frame decoding, CRC8, resynchronization
//! - [`assembler`]: packets to complete 360° sweeps
//! - [`manager`]: acquisition thread, scan publication, status

pub mod assembler;
pub mod config;
pub mod error;
pub mod history;
pub mod manager;
pub mod protocol;
pub mod simulation;
pub mod source;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use assembler::{SweepAssembler, finalize_sweep};
pub use config::{LidarConfig, ObstacleSector, SimulationConfig};
pub use error::{Error, Result};
pub use history::BoundedHistory;
pub use manager::{DEFAULT_CONE_ANGLE_DEG, LidarManager, LidarStatus, ScanCallback};
pub use protocol::{DecoderStats, Ld19Packet, PacketDecoder};
pub use source::ScanSource;
pub use transport::{MockTransport, SerialOpener, Transport, TransportOpener};
pub use types::{LidarPoint, LidarScan};
