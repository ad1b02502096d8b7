//! # Error types

use thiserror::Error;

/// Result type used throughout the core library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the recording core can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or mismatched configuration. Fatal at startup.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Heatmap file unreadable, or an output sink failed to open or write.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Heatmap image exists but could not be decoded.
    #[error("unable to decode image: {0}")]
    Image(image::ImageError),
    /// External notification hook failed. Never fatal.
    #[error("notification hook failed: {0}")]
    Notification(String),
    /// Malformed encoder output.
    #[error("malformed stream: {0}")]
    Stream(String),
}

impl Error {
    /// Whether the process must refuse to start when this error occurs during setup.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Io(_) | Self::Image(_))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Self::Io(e),
            e => Self::Image(e),
        }
    }
}
