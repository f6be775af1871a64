//! # Logging Errors
//!
//! Error taxonomy for the rotating log sinks.
//!
//! - **Configuration**: invalid rotation interval or mode, raised when a sink is built
//! - **RotationIo**: the live file could not be moved aside during rollover
//! - **CorruptArchive**: a freshly written archive failed verification; the
//!   uncompressed file is kept next to it
//! - **ArchiveCleanup**: the archive is verified but the rotated file it was
//!   made from could not be deleted
//! - **Io**: opening, writing or flushing the live stream failed

use std::io;
use std::path::PathBuf;

/// Errors raised by the rotating sinks, the archiver and the registry
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Invalid rotation configuration: {0}")]
    Configuration(String),
    #[error("Failed to rotate log file from '{from}' to '{to}': {source}")]
    RotationIo {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Archive '{archive}' failed verification: {reason}")]
    CorruptArchive { archive: PathBuf, reason: String },
    #[error("Archive '{archive}' is complete but '{rotated}' could not be removed: {source}")]
    ArchiveCleanup {
        archive: PathBuf,
        rotated: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Log file IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LogError::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error came from the rollover step rather than the write itself
    pub fn is_rollover_failure(&self) -> bool {
        matches!(
            self,
            LogError::RotationIo { .. }
                | LogError::CorruptArchive { .. }
                | LogError::ArchiveCleanup { .. }
        )
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
