use crate::FsError;
use bitflags::bitflags;
use fedfs_addr::{EntryName, MountPoint};
use fedfs_io::IoWarning;
use log::warn;
use std::fmt;
use thiserror::Error;

bitflags! {
    /// Composable options controlling one synchronization pass.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SyncOptions: u32 {
        /// Block until all *other* threads' open entry input streams close.
        /// The current thread's own streams are ignored; interruption
        /// aborts the wait without error.
        const WAIT_CLOSE_INPUT = 1 << 0;
        /// Like `WAIT_CLOSE_INPUT` for output streams.
        const WAIT_CLOSE_OUTPUT = 1 << 1;
        /// Proceed despite open input streams, forcibly invalidating them.
        /// Subsequent I/O on them fails; reported as a sync warning.
        const FORCE_CLOSE_INPUT = 1 << 2;
        /// Like `FORCE_CLOSE_INPUT` for output streams. Requires
        /// `FORCE_CLOSE_INPUT` to be set as well.
        const FORCE_CLOSE_OUTPUT = 1 << 3;
        /// Discard pending writes. Only meaningful immediately before the
        /// target filesystem is deleted.
        const ABORT_CHANGES = 1 << 4;
        /// Evict cached entry data after flushing.
        const CLEAR_CACHE = 1 << 5;
    }
}

impl SyncOptions {
    /// Commit pending changes, severing open streams if necessary.
    pub const UPDATE: SyncOptions = SyncOptions::FORCE_CLOSE_INPUT
        .union(SyncOptions::FORCE_CLOSE_OUTPUT);

    /// [`SyncOptions::UPDATE`] plus cache eviction, for unmounting.
    pub const UMOUNT: SyncOptions = SyncOptions::UPDATE.union(SyncOptions::CLEAR_CACHE);

    /// Reject illegal combinations before any I/O occurs.
    ///
    /// Forcing output streams closed while leaving input streams open would
    /// commit an archive that readers still hold, so `FORCE_CLOSE_OUTPUT`
    /// requires `FORCE_CLOSE_INPUT`.
    pub fn validate(self) -> std::result::Result<(), SyncError> {
        if self.contains(SyncOptions::FORCE_CLOSE_OUTPUT)
            && !self.contains(SyncOptions::FORCE_CLOSE_INPUT)
        {
            return Err(SyncError::IllegalOptions(self));
        }
        Ok(())
    }
}

/// Which side of the stream accounting an option or warning refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Input,
    Output,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Input => f.write_str("input"),
            StreamKind::Output => f.write_str("output"),
        }
    }
}

/// A non-fatal synchronization incident. No data was lost.
#[derive(Debug, Error)]
pub enum SyncWarning {
    /// Open streams were severed because a FORCE_CLOSE option was set.
    #[error("forcibly closed {count} open {kind} stream(s) on {mount_point}")]
    ForcedClose {
        mount_point: MountPoint,
        kind: StreamKind,
        count: usize,
    },

    /// The last-modified time could not be propagated to the parent.
    #[error("could not propagate last-modified time of `{entry_name}` on {mount_point}: {cause}")]
    SetTime {
        mount_point: MountPoint,
        entry_name: EntryName,
        #[source]
        cause: std::io::Error,
    },

    /// A pending multiplexed write was dropped while draining.
    #[error("on {mount_point}: {warning}")]
    DroppedBuffer {
        mount_point: MountPoint,
        #[source]
        warning: IoWarning,
    },
}

/// A fatal synchronization failure for one filesystem. Data loss is
/// implied: pending changes may not have reached the parent storage.
#[derive(Debug, Error)]
#[error("sync of {mount_point} failed: {cause}")]
pub struct SyncFatal {
    pub mount_point: MountPoint,
    #[source]
    pub cause: Box<FsError>,
}

/// Aggregate outcome of a synchronization pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The option combination was rejected before any I/O occurred.
    #[error("illegal sync option combination: {0:?}")]
    IllegalOptions(SyncOptions),

    /// Streams are open and neither WAIT nor FORCE options cover them.
    /// Recoverable: retry once the streams are closed.
    #[error("filesystem is busy")]
    Busy,

    /// The pass completed, but with warnings. No data was lost.
    #[error("sync completed with {} warning(s)", .0.len())]
    Warn(Vec<SyncWarning>),

    /// The pass aborted on a fatal error; collected warnings are embedded.
    #[error("{fatal}")]
    Fatal {
        fatal: SyncFatal,
        warnings: Vec<SyncWarning>,
    },
}

/// Accumulates warnings across a synchronization pass.
///
/// Warnings are collected and the pass continues across independent
/// filesystems; the first fatal error aborts the pass with the collected
/// warnings embedded.
#[derive(Debug, Default)]
pub struct SyncReport {
    warnings: Vec<SyncWarning>,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-fatal incident and keep going.
    pub fn warn(&mut self, warning: SyncWarning) {
        warn!("sync warning: {}", warning);
        self.warnings.push(warning);
    }

    /// The warnings collected so far.
    pub fn warnings(&self) -> &[SyncWarning] {
        &self.warnings
    }

    /// Finish the pass: nothing to report, or a warning aggregate.
    pub fn finish(self) -> std::result::Result<(), SyncError> {
        if self.warnings.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Warn(self.warnings))
        }
    }

    /// Abort the pass on a fatal error, embedding collected warnings.
    pub fn finish_fatal(self, fatal: SyncFatal) -> SyncError {
        SyncError::Fatal {
            fatal,
            warnings: self.warnings,
        }
    }
}

/// Decides the final disposition of a completed synchronization pass.
pub trait SyncHandler {
    fn handle(
        &mut self,
        result: std::result::Result<(), SyncError>,
    ) -> std::result::Result<(), SyncError>;
}

/// The default handler: pass the outcome through unchanged.
#[derive(Debug, Default)]
pub struct PropagateSync;

impl SyncHandler for PropagateSync {
    fn handle(
        &mut self,
        result: std::result::Result<(), SyncError>,
    ) -> std::result::Result<(), SyncError> {
        result
    }
}
