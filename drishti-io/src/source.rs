//! Where sweeps come from
//!
//! The set of sources is closed: a serial LD-19 or the simulated room. The
//! choice is made once per scanning session.

use crate::assembler::SweepAssembler;
use crate::config::LidarConfig;
use crate::error::Result;
use crate::protocol::{DecoderStats, PacketDecoder};
use crate::simulation::SimulatedSource;
use crate::transport::{Transport, TransportOpener};
use crate::types::LidarPoint;
use std::collections::VecDeque;

/// Packet-driven source reading from a transport
pub struct SerialSource {
    transport: Box<dyn Transport>,
    decoder: PacketDecoder,
    assembler: SweepAssembler,
    completed: VecDeque<Vec<LidarPoint>>,
}

impl SerialSource {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            decoder: PacketDecoder::new(),
            assembler: SweepAssembler::new(),
            completed: VecDeque::new(),
        }
    }

    /// Read one chunk and return a finished sweep if one closed.
    ///
    /// Blocks at most for the transport's read timeout.
    pub fn poll(&mut self) -> Result<Option<Vec<LidarPoint>>> {
        if let Some(sweep) = self.completed.pop_front() {
            return Ok(Some(sweep));
        }

        self.decoder.read_from(self.transport.as_mut())?;
        for packet in self.decoder.packets() {
            if let Some(sweep) = self.assembler.push(&packet) {
                self.completed.push_back(sweep);
            }
        }

        Ok(self.completed.pop_front())
    }

    pub fn take_decoder_stats(&mut self) -> DecoderStats {
        self.decoder.take_stats()
    }
}

/// Active sweep source
pub enum ScanSource {
    Simulated(SimulatedSource),
    Serial(SerialSource),
}

impl ScanSource {
    /// Pick a source for a new session.
    ///
    /// Hardware is tried only when the config asks for it and an opener is
    /// available; any open failure falls back to simulation.
    pub fn select(config: &LidarConfig, opener: Option<&dyn TransportOpener>) -> Self {
        match opener {
            Some(opener) if config.wants_hardware() => match opener.open() {
                Ok(transport) => {
                    log::info!("LD-19 transport opened: {}", opener.describe());
                    ScanSource::Serial(SerialSource::new(transport))
                }
                Err(e) => {
                    log::warn!(
                        "Failed to open LD-19 transport {}: {}. Falling back to simulation.",
                        opener.describe(),
                        e
                    );
                    Self::simulated(config)
                }
            },
            _ => {
                log::info!("LD-19 hardware disabled, using simulated source");
                Self::simulated(config)
            }
        }
    }

    pub fn simulated(config: &LidarConfig) -> Self {
        ScanSource::Simulated(SimulatedSource::new(&config.simulation))
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, ScanSource::Simulated(_))
    }

    /// Next finished sweep, if any
    pub fn poll(&mut self) -> Result<Option<Vec<LidarPoint>>> {
        match self {
            ScanSource::Simulated(sim) => Ok(Some(sim.generate())),
            ScanSource::Serial(serial) => serial.poll(),
        }
    }

    /// Decoder counters since the last call (always zero when simulated)
    pub fn take_decoder_stats(&mut self) -> DecoderStats {
        match self {
            ScanSource::Simulated(_) => DecoderStats::default(),
            ScanSource::Serial(serial) => serial.take_decoder_stats(),
        }
    }
}
