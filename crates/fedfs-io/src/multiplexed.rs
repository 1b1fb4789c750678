use crate::{
    ArchiveEntry, EntryContainer, IoError, IoWarning, OutputArchive, Result, TEMP_PREFIX,
};
use fedfs_addr::EntryName;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Decorates an [`OutputArchive`] so callers may hold any number of entry
/// output streams open at once, even though the target accepts only one.
///
/// While the target is idle a requested stream writes straight through and
/// marks the target busy for its lifetime. While the target is busy the
/// write is redirected to a temp file and the entry is queued. Whenever a
/// stream closes, queued entries whose streams have also closed are drained
/// to the target in insertion order.
///
/// Failure policy while draining: a failure reading a pending temp file is
/// a recoverable per-entry warning (the entry is dropped and draining
/// continues, see [`MultiplexedOutput::take_warnings`]); a failure writing
/// to the target is fatal and aborts the drain immediately.
pub struct MultiplexedOutput<A: OutputArchive + Send> {
    shared: Arc<Mutex<Inner<A>>>,
}

struct Inner<A: OutputArchive + Send> {
    target: A,
    temp_dir: Option<PathBuf>,
    /// The stream currently writing straight to the target, if any.
    active: Option<ActiveStream>,
    /// Temp-buffered writes in insertion order.
    pending: VecDeque<PendingEntry>,
    warnings: Vec<IoWarning>,
    next_stream_id: u64,
    closed: bool,
}

struct ActiveStream {
    id: u64,
    name: EntryName,
    stream: Box<dyn Write + Send>,
}

struct PendingEntry {
    entry: ArchiveEntry,
    template: Option<ArchiveEntry>,
    temp: NamedTempFile,
    open: bool,
}

impl<A: OutputArchive + Send> MultiplexedOutput<A> {
    /// Decorate `target`, buffering to the platform temp directory.
    pub fn new(target: A) -> Self {
        Self::with_temp_dir(target, None)
    }

    /// Decorate `target`, buffering to `temp_dir` when given.
    pub fn with_temp_dir(target: A, temp_dir: Option<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Inner {
                target,
                temp_dir,
                active: None,
                pending: VecDeque::new(),
                warnings: Vec::new(),
                next_stream_id: 0,
                closed: false,
            })),
        }
    }

    /// Open an output stream for `entry`.
    ///
    /// Returns a direct stream if the target is idle, a temp-buffered one
    /// otherwise. Requesting a name that already has an open stream fails
    /// with [`IoError::OutputBusy`].
    pub fn output_stream(
        &self,
        entry: ArchiveEntry,
        template: Option<ArchiveEntry>,
    ) -> Result<MuxStream<A>> {
        let mut inner = self.shared.lock();
        if inner.closed {
            return Err(IoError::Closed);
        }
        let name = entry.name().clone();
        let name_open = inner
            .active
            .as_ref()
            .map(|active| active.name == name)
            .unwrap_or(false)
            || inner
                .pending
                .iter()
                .any(|rec| rec.open && rec.entry.name() == &name);
        if name_open {
            return Err(IoError::OutputBusy);
        }
        if inner.active.is_none() {
            let stream = inner.target.output_stream(&entry, template.as_ref())?;
            let id = inner.next_stream_id;
            inner.next_stream_id += 1;
            inner.active = Some(ActiveStream { id, name, stream });
            debug!("mux: direct stream for `{}`", entry.name());
            Ok(MuxStream {
                shared: self.shared.clone(),
                mode: StreamMode::Direct(id),
                done: false,
            })
        } else {
            let mut builder = tempfile::Builder::new();
            builder.prefix(TEMP_PREFIX);
            let temp = match &inner.temp_dir {
                Some(dir) => builder.tempfile_in(dir)?,
                None => builder.tempfile()?,
            };
            debug!(
                "mux: target busy, buffering `{}` to {:?}",
                entry.name(),
                temp.path()
            );
            inner.pending.push_back(PendingEntry {
                entry,
                template,
                temp,
                open: true,
            });
            Ok(MuxStream {
                shared: self.shared.clone(),
                mode: StreamMode::Buffered(name),
                done: false,
            })
        }
    }

    /// True while an entry stream writes straight to the target.
    pub fn is_busy(&self) -> bool {
        self.shared.lock().active.is_some()
    }

    /// Names of entries still queued behind the busy target.
    pub fn pending_names(&self) -> Vec<EntryName> {
        self.shared
            .lock()
            .pending
            .iter()
            .map(|rec| rec.entry.name().clone())
            .collect()
    }

    /// Drain and clear the warnings collected so far.
    pub fn take_warnings(&self) -> Vec<IoWarning> {
        std::mem::take(&mut self.shared.lock().warnings)
    }

    /// Drain every pending entry and close the target.
    ///
    /// Fails with [`IoError::OutputBusy`] while any stream (direct or
    /// pending) is still open; in that case nothing is closed and the call
    /// may be retried once the streams are gone.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.shared.lock();
        if inner.closed {
            return Ok(());
        }
        if inner.active.is_some() {
            return Err(IoError::OutputBusy);
        }
        drain(&mut inner)?;
        if !inner.pending.is_empty() {
            return Err(IoError::OutputBusy);
        }
        inner.target.close()?;
        inner.closed = true;
        Ok(())
    }
}

impl<A: OutputArchive + Send> EntryContainer for MultiplexedOutput<A> {
    fn len(&self) -> usize {
        self.entries().len()
    }

    fn entries(&self) -> Vec<ArchiveEntry> {
        let inner = self.shared.lock();
        let mut merged = inner.target.entries();
        for rec in &inner.pending {
            let snapshot = pending_snapshot(rec);
            match merged.iter_mut().find(|e| e.name() == snapshot.name()) {
                Some(slot) => *slot = snapshot,
                None => merged.push(snapshot),
            }
        }
        merged
    }

    fn entry(&self, name: &EntryName) -> Option<ArchiveEntry> {
        let inner = self.shared.lock();
        inner
            .pending
            .iter()
            .rev()
            .find(|rec| rec.entry.name() == name)
            .map(pending_snapshot)
            .or_else(|| inner.target.entry(name))
    }
}

/// A pending entry as seen through the container view, with unknown fields
/// defaulted from the temp file observed so far.
fn pending_snapshot(rec: &PendingEntry) -> ArchiveEntry {
    let meta = rec.temp.as_file().metadata().ok();
    let size = meta.as_ref().map(|m| m.len()).unwrap_or(0);
    let mtime = meta.and_then(|m| m.modified().ok());
    rec.entry.clone().or_observed(size, mtime)
}

/// Flush closed pending entries to the idle target, oldest first.
///
/// Stops when the queue is empty, the oldest record's stream is still open,
/// or the target is busy again. Never spins: every iteration either pops a
/// record or returns.
fn drain<A: OutputArchive + Send>(inner: &mut Inner<A>) -> Result<()> {
    loop {
        if inner.active.is_some() {
            return Ok(());
        }
        match inner.pending.front() {
            Some(rec) if !rec.open => {}
            _ => return Ok(()),
        }
        let rec = match inner.pending.pop_front() {
            Some(rec) => rec,
            None => return Ok(()),
        };
        let name = rec.entry.name().clone();
        let data = match fs::read(rec.temp.path()) {
            Ok(data) => data,
            Err(cause) => {
                warn!("mux: dropping pending entry `{}`: {}", name, cause);
                inner.warnings.push(IoWarning {
                    entry_name: name,
                    cause,
                });
                continue;
            }
        };
        let observed_mtime = rec.temp.as_file().metadata().ok().and_then(|m| m.modified().ok());
        let entry = rec.entry.or_observed(data.len() as u64, observed_mtime);
        let mut out = inner.target.output_stream(&entry, rec.template.as_ref())?;
        out.write_all(&data)?;
        out.flush()?;
        drop(out);
        debug!("mux: drained `{}` ({} bytes)", name, data.len());
        // `rec.temp` drops here, deleting the temp file.
    }
}

impl<A: OutputArchive + Send + 'static> OutputArchive for MultiplexedOutput<A> {
    fn output_stream(
        &mut self,
        entry: &ArchiveEntry,
        template: Option<&ArchiveEntry>,
    ) -> Result<Box<dyn Write + Send>> {
        let stream = MultiplexedOutput::output_stream(self, entry.clone(), template.cloned())?;
        Ok(Box::new(stream))
    }

    fn close(&mut self) -> Result<()> {
        MultiplexedOutput::close(self)
    }
}

enum StreamMode {
    /// Writing straight to the target; the id guards against stale handles.
    Direct(u64),
    /// Writing to the pending record with this name.
    Buffered(EntryName),
}

/// An entry output stream handed out by [`MultiplexedOutput`].
///
/// Close it explicitly to observe drain errors; dropping it closes with
/// errors demoted to log warnings.
pub struct MuxStream<A: OutputArchive + Send> {
    shared: Arc<Mutex<Inner<A>>>,
    mode: StreamMode,
    done: bool,
}

impl<A: OutputArchive + Send> std::fmt::Debug for MuxStream<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuxStream")
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<A: OutputArchive + Send> MuxStream<A> {
    /// Close this stream and drain whatever became flushable.
    pub fn close(mut self) -> Result<()> {
        self.close_impl()
    }

    fn close_impl(&mut self) -> Result<()> {
        if self.done {
            return Ok(());
        }
        self.done = true;
        let mut inner = self.shared.lock();
        match &self.mode {
            StreamMode::Direct(id) => {
                let matches = inner
                    .active
                    .as_ref()
                    .map(|active| active.id == *id)
                    .unwrap_or(false);
                if matches {
                    if let Some(mut active) = inner.active.take() {
                        active.stream.flush()?;
                        drop(active);
                    }
                }
            }
            StreamMode::Buffered(name) => {
                if let Some(rec) = inner
                    .pending
                    .iter_mut()
                    .find(|rec| rec.open && rec.entry.name() == name)
                {
                    rec.temp.as_file_mut().flush()?;
                    rec.open = false;
                }
            }
        }
        drain(&mut inner)
    }
}

impl<A: OutputArchive + Send> Write for MuxStream<A> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.done {
            return Err(io::Error::new(io::ErrorKind::Other, "stream is closed"));
        }
        let mut inner = self.shared.lock();
        match &self.mode {
            StreamMode::Direct(id) => match inner.active.as_mut() {
                Some(active) if active.id == *id => active.stream.write(buf),
                _ => Err(io::Error::new(io::ErrorKind::Other, "stream is closed")),
            },
            StreamMode::Buffered(name) => {
                match inner
                    .pending
                    .iter_mut()
                    .find(|rec| rec.open && rec.entry.name() == name)
                {
                    Some(rec) => rec.temp.as_file_mut().write(buf),
                    None => Err(io::Error::new(io::ErrorKind::Other, "stream is closed")),
                }
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut inner = self.shared.lock();
        match &self.mode {
            StreamMode::Direct(id) => match inner.active.as_mut() {
                Some(active) if active.id == *id => active.stream.flush(),
                _ => Ok(()),
            },
            StreamMode::Buffered(name) => {
                match inner
                    .pending
                    .iter_mut()
                    .find(|rec| rec.open && rec.entry.name() == name)
                {
                    Some(rec) => rec.temp.as_file_mut().flush(),
                    None => Ok(()),
                }
            }
        }
    }
}

impl<A: OutputArchive + Send> Drop for MuxStream<A> {
    fn drop(&mut self) {
        if let Err(err) = self.close_impl() {
            warn!("mux: error closing dropped stream: {}", err);
        }
    }
}
