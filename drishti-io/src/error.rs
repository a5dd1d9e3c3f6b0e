//! Error types for Drishti

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Drishti error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Communication timeout
    #[error("Communication timeout")]
    Timeout,

    /// Fewer bytes than a full frame
    #[error("Short packet: expected {expected} bytes, got {actual}")]
    ShortPacket {
        /// Required frame length
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Frame does not start with the LD-19 header
    #[error("Invalid header: {0:#04x} {1:#04x}")]
    InvalidHeader(u8, u8),

    /// Checksum mismatch
    #[error("Checksum error: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumError {
        /// Checksum computed over the frame
        expected: u8,
        /// Checksum byte carried by the frame
        actual: u8,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Acquisition thread could not be spawned or joined
    #[error("Thread error: {0}")]
    Thread(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}
