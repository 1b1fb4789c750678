use crate::{ArchiveEntry, Result};
use fedfs_addr::EntryName;
use std::io::{Read, Write};

/// An enumerable, name-addressable collection of archive entries.
///
/// Accessors return snapshots; membership changes only through the driver
/// mutation API, never through the container surface.
pub trait EntryContainer {
    /// Number of entries currently in the container.
    fn len(&self) -> usize;

    /// True if the container holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of all entries.
    fn entries(&self) -> Vec<ArchiveEntry>;

    /// Look up one entry by name.
    fn entry(&self, name: &EntryName) -> Option<ArchiveEntry>;
}

/// An open archive serving entry content for reading.
pub trait InputArchive: EntryContainer {
    /// Open a stream over the named entry's content.
    fn input_stream(&self, name: &EntryName) -> Result<Box<dyn Read + Send>>;
}

/// An open archive accepting entry content for writing.
///
/// The real target serves **at most one live entry output stream**; while a
/// stream is open, further `output_stream` calls fail with
/// [`crate::IoError::OutputBusy`]. An entry becomes part of the container
/// when its stream is flushed and dropped. Wrap the target in
/// [`crate::MultiplexedOutput`] to lift the single-stream limit.
pub trait OutputArchive: EntryContainer {
    /// Open a stream writing the given entry's content.
    ///
    /// `template` optionally supplies metadata (size, time) copied from an
    /// existing entry, e.g. when an entry is moved between archives.
    fn output_stream(
        &mut self,
        entry: &ArchiveEntry,
        template: Option<&ArchiveEntry>,
    ) -> Result<Box<dyn Write + Send>>;

    /// Finish the archive. Fails if an entry stream is still open.
    fn close(&mut self) -> Result<()>;
}
