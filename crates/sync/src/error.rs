//! Sync engine error types (thiserror-based).

use thiserror::Error;

/// Synchronization subsystem error type.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Playback rate must be strictly positive.
    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),

    /// Measurement export IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::InvalidRate(-1.0);
        assert_eq!(err.to_string(), "Invalid playback rate: -1");
    }

    #[test]
    fn error_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let sync_err: SyncError = io_err.into();
        assert!(matches!(sync_err, SyncError::Io(_)));
    }
}
