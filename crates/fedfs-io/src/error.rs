use fedfs_addr::EntryName;
use thiserror::Error;

/// Errors raised by archive containers, sockets and the multiplexer.
#[derive(Debug, Error)]
pub enum IoError {
    /// The requested entry is absent from the container.
    #[error("entry not found: `{0}`")]
    EntryNotFound(EntryName),

    /// The archive cannot serve another input stream right now.
    ///
    /// Recoverable: the operation may succeed once the archive is idle.
    #[error("archive input is busy")]
    InputBusy,

    /// The archive cannot serve another output stream right now.
    ///
    /// Recoverable: the operation may succeed once the archive is idle.
    #[error("archive output is busy")]
    OutputBusy,

    /// The stream was invalidated, typically by a forced close.
    #[error("stream is closed")]
    Closed,

    /// I/O error from the underlying storage.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A recoverable per-entry incident collected while draining pending
/// multiplexed writes. No data already stored in the target is affected.
#[derive(Debug, Error)]
#[error("dropped pending entry `{entry_name}`: {cause}")]
pub struct IoWarning {
    /// The entry whose buffered content was dropped.
    pub entry_name: EntryName,
    /// What went wrong while reading the buffer back.
    pub cause: std::io::Error,
}

/// Result type for archive I/O operations.
pub type Result<T> = std::result::Result<T, IoError>;
