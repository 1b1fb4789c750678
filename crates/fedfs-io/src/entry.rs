use fedfs_addr::EntryName;
use std::time::SystemTime;

/// The kind of an archive entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file content.
    File,
    /// A directory, possibly implicit in the archive.
    Directory,
    /// Anything else a driver may store (links, device nodes).
    Special,
}

/// A size/time/kind-tagged record describing one entry of an archive.
///
/// Unknown size or time is `None`; multiplexed flushing fills unknown
/// fields from the observed temp file before writing to the target.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    name: EntryName,
    kind: EntryKind,
    size: Option<u64>,
    mtime: Option<SystemTime>,
}

impl ArchiveEntry {
    /// Create an entry record of the given kind with unknown size and time.
    pub fn new(name: EntryName, kind: EntryKind) -> Self {
        Self {
            name,
            kind,
            size: None,
            mtime: None,
        }
    }

    /// Convenience constructor for a file entry named by a valid literal.
    ///
    /// Panics on an invalid literal; intended for driver and test code that
    /// controls the name.
    pub fn file(name: &str) -> Self {
        match EntryName::parse(name) {
            Ok(name) => Self::new(name, EntryKind::File),
            Err(err) => panic!("invalid entry name literal: {err}"),
        }
    }

    /// The entry name.
    pub fn name(&self) -> &EntryName {
        &self.name
    }

    /// The entry kind.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    /// The uncompressed size, if known.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// The last-modified time, if known.
    pub fn mtime(&self) -> Option<SystemTime> {
        self.mtime
    }

    /// Set the size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the last-modified time.
    pub fn with_mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Fill unknown size/time fields from another record, leaving known
    /// fields untouched.
    pub fn or_observed(mut self, size: u64, mtime: Option<SystemTime>) -> Self {
        if self.size.is_none() {
            self.size = Some(size);
        }
        if self.mtime.is_none() {
            self.mtime = mtime;
        }
        self
    }
}
