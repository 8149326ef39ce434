//! Error types for volume operations.
//!
//! Every failure a driver operation can report is a [`DriverError`]. Cleanup
//! failures on teardown paths never become a `DriverError`; they are logged
//! and dropped.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by the driver core.
pub type DriverResult<T> = Result<T, DriverError>;

/// Failure of a single volume operation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The volume is not registered.
    #[error("Unable to find volume mounted on {}", .0.display())]
    VolumeNotFound(PathBuf),

    /// The backing resource has no active mount.
    #[error("Unable to find volume mounted on {}", .0.display())]
    NotMounted(PathBuf),

    /// The backing resource does not name a single directory under the root.
    #[error("invalid backing resource {0:?}")]
    InvalidResource(String),

    /// Something other than a directory sits at the mountpoint.
    #[error("{} already exist and it's not a directory", .0.display())]
    AlreadyOccupied(PathBuf),

    /// The filesystem backend could not be created.
    #[error("backend initialization failed for {bucket}: {reason}")]
    BackendInit {
        /// Remote identifier the backend was created for.
        bucket: String,
        /// Human-readable failure reason.
        reason: String,
    },

    /// The mount facility refused to attach the backend.
    #[error("Mount: {}: {source}", .path.display())]
    MountFacility {
        /// Mountpoint the attach was attempted at.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The mountpoint could not be inspected or created.
    #[error("{}: {source}", .path.display())]
    Filesystem {
        /// Path the operation failed on.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },
}

impl DriverError {
    /// Wraps an I/O error raised while preparing `path`.
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
