use crate::SyncError;
use fedfs_addr::{AddressError, EntryName};
use fedfs_io::IoError;
use thiserror::Error;

/// Errors raised by controller operations and the federation manager.
#[derive(Debug, Error)]
pub enum FsError {
    /// Address parsing or validation failure.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// Internal signal: the path this controller was built for does not
    /// actually hold a valid archive of the declared type.
    ///
    /// Resolved per call by the federation decorator, which re-issues the
    /// operation against the parent filesystem. Never escapes the chain.
    #[error("prospective archive is a false positive")]
    FalsePositive,

    /// The requested entry is absent or inaccessible.
    #[error("entry not found: `{0}`")]
    EntryNotFound(EntryName),

    /// The archive cannot serve another input stream right now.
    /// Recoverable: retry once the archive is idle.
    #[error("archive input is busy")]
    InputBusy,

    /// The archive cannot serve another output stream right now.
    /// Recoverable: retry once the archive is idle.
    #[error("archive output is busy")]
    OutputBusy,

    /// The stream was invalidated, typically by a forced close during sync.
    #[error("stream is closed")]
    Closed,

    /// Wraps a failure that may succeed on retry without the archive being
    /// misclassified as a false positive (e.g. a cancelled credential
    /// prompt).
    #[error("transient failure: {0}")]
    Transient(String),

    /// The filesystem or entry does not accept writes.
    #[error("filesystem is read-only")]
    ReadOnly,

    /// Synchronization failure, see [`SyncError`].
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// I/O error from the underlying storage.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<IoError> for FsError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::EntryNotFound(name) => FsError::EntryNotFound(name),
            IoError::InputBusy => FsError::InputBusy,
            IoError::OutputBusy => FsError::OutputBusy,
            IoError::Closed => FsError::Closed,
            IoError::Io(err) => FsError::Io(err),
        }
    }
}

/// Result type for controller and manager operations.
pub type Result<T> = std::result::Result<T, FsError>;
