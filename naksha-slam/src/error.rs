//! Error types for Naksha

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Naksha error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Map image encoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Acquisition layer error
    #[error("Lidar error: {0}")]
    Lidar(#[from] drishti_io::Error),
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
