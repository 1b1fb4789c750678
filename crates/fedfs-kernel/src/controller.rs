use crate::{FsModel, Result, SyncOptions, SyncReport};
use bitflags::bitflags;
use fedfs_addr::EntryName;
use fedfs_io::{ArchiveEntry, EntryKind};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::SystemTime;

bitflags! {
    /// Options for opening entry input streams.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InputOptions: u32 {
        /// Allow an external caching decorator to keep the entry content.
        const CACHE = 1 << 0;
    }
}

bitflags! {
    /// Options for opening entry output streams and creating entries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OutputOptions: u32 {
        /// Allow an external caching decorator to keep the entry content.
        const CACHE = 1 << 0;
        /// Create missing parent directories.
        const CREATE_PARENTS = 1 << 1;
        /// Fail if the entry already exists.
        const EXCLUSIVE = 1 << 2;
        /// Append to existing content instead of replacing it.
        const APPEND = 1 << 3;
    }
}

/// A lazy factory for one entry's input stream.
///
/// `entry` re-reads the live entry record; `open` produces the stream.
pub trait InputSocket: Send {
    fn entry(&self) -> Result<ArchiveEntry>;
    fn open(&self) -> Result<Box<dyn Read + Send>>;
}

/// A lazy factory for one entry's output stream.
pub trait OutputSocket: Send {
    fn entry(&self) -> Result<ArchiveEntry>;
    fn open(&self) -> Result<Box<dyn Write + Send>>;
}

/// The operational node of one federated filesystem.
///
/// Controllers form a tree mirroring mount point nesting and are bound 1:1
/// to their [`FsModel`]. Every operation must be safely retryable after any
/// failure: no operation may leave partial, unrecoverable side effects that
/// block a correct retry.
pub trait FsController: Send + Sync {
    /// The model this controller is bound to.
    fn model(&self) -> &Arc<FsModel>;

    /// The parent filesystem's controller, absent for root filesystems.
    fn parent(&self) -> Option<&Arc<dyn FsController>>;

    /// Look up an entry record, `None` if absent.
    fn entry(&self, name: &EntryName) -> Result<Option<ArchiveEntry>>;

    /// True if the entry exists and its content can be read.
    fn is_readable(&self, name: &EntryName) -> Result<bool>;

    /// True if the entry can be written or created.
    fn is_writable(&self, name: &EntryName) -> Result<bool>;

    /// Set the entry's last-modified time.
    fn set_time(&self, name: &EntryName, mtime: SystemTime) -> Result<()>;

    /// A socket for reading the entry's content.
    fn input_socket(&self, name: &EntryName, options: InputOptions)
        -> Result<Box<dyn InputSocket>>;

    /// A socket for writing the entry's content.
    ///
    /// `template` optionally supplies metadata copied from an existing
    /// entry, e.g. when content moves between archives.
    fn output_socket(
        &self,
        name: &EntryName,
        options: OutputOptions,
        template: Option<ArchiveEntry>,
    ) -> Result<Box<dyn OutputSocket>>;

    /// Create an entry of the given kind without opening a stream.
    fn mknod(
        &self,
        name: &EntryName,
        kind: EntryKind,
        options: OutputOptions,
        template: Option<ArchiveEntry>,
    ) -> Result<()>;

    /// Remove an entry.
    fn unlink(&self, name: &EntryName) -> Result<()>;

    /// Commit pending changes to the parent storage.
    ///
    /// Warnings go to `report`; a returned error is fatal for this
    /// filesystem and implies possible data loss.
    fn sync(&self, options: SyncOptions, report: &mut SyncReport) -> Result<()>;
}
