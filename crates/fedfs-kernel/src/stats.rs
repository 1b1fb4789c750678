use crate::{
    FsController, FsModel, InputOptions, InputSocket, OutputOptions, OutputSocket, Result,
    SyncOptions, SyncReport,
};
use chrono::{DateTime, Utc};
use fedfs_addr::EntryName;
use fedfs_io::{ArchiveEntry, CountingRead, CountingWrite, EntryKind};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// A point-in-time view of the manager's filesystems, for external
/// monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Live federated filesystems, all nesting levels.
    pub filesystems: usize,
    /// How many of them have pending, unsynchronized writes.
    pub touched: usize,
    /// Filesystems mounted directly on a root filesystem.
    pub top_level: usize,
    /// How many top-level filesystems are touched.
    pub top_level_touched: usize,
    /// Bytes read through top-level filesystems since the last full sync.
    pub bytes_read: u64,
    /// Bytes written through top-level filesystems since the last full sync.
    pub bytes_written: u64,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

/// Decorates a top-level controller, feeding every stream's byte counts
/// into the manager's cumulative counters.
pub struct StatisticsController {
    inner: Arc<dyn FsController>,
    read: Arc<AtomicU64>,
    written: Arc<AtomicU64>,
}

impl StatisticsController {
    pub fn new(
        inner: Arc<dyn FsController>,
        read: Arc<AtomicU64>,
        written: Arc<AtomicU64>,
    ) -> Self {
        Self {
            inner,
            read,
            written,
        }
    }
}

impl FsController for StatisticsController {
    fn model(&self) -> &Arc<FsModel> {
        self.inner.model()
    }

    fn parent(&self) -> Option<&Arc<dyn FsController>> {
        self.inner.parent()
    }

    fn entry(&self, name: &EntryName) -> Result<Option<ArchiveEntry>> {
        self.inner.entry(name)
    }

    fn is_readable(&self, name: &EntryName) -> Result<bool> {
        self.inner.is_readable(name)
    }

    fn is_writable(&self, name: &EntryName) -> Result<bool> {
        self.inner.is_writable(name)
    }

    fn set_time(&self, name: &EntryName, mtime: SystemTime) -> Result<()> {
        self.inner.set_time(name, mtime)
    }

    fn input_socket(
        &self,
        name: &EntryName,
        options: InputOptions,
    ) -> Result<Box<dyn InputSocket>> {
        let inner = self.inner.input_socket(name, options)?;
        Ok(Box::new(CountingInputSocket {
            inner,
            counter: self.read.clone(),
        }))
    }

    fn output_socket(
        &self,
        name: &EntryName,
        options: OutputOptions,
        template: Option<ArchiveEntry>,
    ) -> Result<Box<dyn OutputSocket>> {
        let inner = self.inner.output_socket(name, options, template)?;
        Ok(Box::new(CountingOutputSocket {
            inner,
            counter: self.written.clone(),
        }))
    }

    fn mknod(
        &self,
        name: &EntryName,
        kind: EntryKind,
        options: OutputOptions,
        template: Option<ArchiveEntry>,
    ) -> Result<()> {
        self.inner.mknod(name, kind, options, template)
    }

    fn unlink(&self, name: &EntryName) -> Result<()> {
        self.inner.unlink(name)
    }

    fn sync(&self, options: SyncOptions, report: &mut SyncReport) -> Result<()> {
        self.inner.sync(options, report)
    }
}

struct CountingInputSocket {
    inner: Box<dyn InputSocket>,
    counter: Arc<AtomicU64>,
}

impl InputSocket for CountingInputSocket {
    fn entry(&self) -> Result<ArchiveEntry> {
        self.inner.entry()
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let stream = self.inner.open()?;
        Ok(Box::new(CountingRead::new(stream, self.counter.clone())))
    }
}

struct CountingOutputSocket {
    inner: Box<dyn OutputSocket>,
    counter: Arc<AtomicU64>,
}

impl OutputSocket for CountingOutputSocket {
    fn entry(&self) -> Result<ArchiveEntry> {
        self.inner.entry()
    }

    fn open(&self) -> Result<Box<dyn Write + Send>> {
        let stream = self.inner.open()?;
        Ok(Box::new(CountingWrite::new(stream, self.counter.clone())))
    }
}

/// Shared byte counters behind the statistics decorators.
#[derive(Debug, Default)]
pub(crate) struct ByteTotals {
    pub read: Arc<AtomicU64>,
    pub written: Arc<AtomicU64>,
}

impl ByteTotals {
    pub fn reset(&self) {
        self.read.store(0, Ordering::Relaxed);
        self.written.store(0, Ordering::Relaxed);
    }
}
