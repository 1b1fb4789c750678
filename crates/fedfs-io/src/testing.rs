//! In-memory archive doubles for tests, examples and driver development.

use crate::{ArchiveEntry, EntryContainer, InputArchive, IoError, OutputArchive, Result};
use fedfs_addr::EntryName;
use parking_lot::Mutex;
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::time::SystemTime;

/// An in-memory archive enforcing the single-live-writer rule of real
/// archive targets, with instrumentation for concurrency assertions.
///
/// An entry is registered when its stream opens and its content committed
/// when the stream drops, mirroring how sequential archive writers behave.
#[derive(Clone, Default)]
pub struct MemArchive {
    state: Arc<Mutex<MemState>>,
}

#[derive(Default)]
struct MemState {
    entries: Vec<(ArchiveEntry, Vec<u8>)>,
    commit_order: Vec<EntryName>,
    busy: bool,
    writers_now: usize,
    writers_peak: usize,
    closed: bool,
}

impl MemArchive {
    /// A fresh empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed content of the named entry, if any.
    pub fn content(&self, name: &str) -> Option<Vec<u8>> {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .find(|(entry, _)| entry.name().as_str() == name)
            .map(|(_, data)| data.clone())
    }

    /// Entry names in the order their streams were committed.
    pub fn commit_order(&self) -> Vec<String> {
        self.state
            .lock()
            .commit_order
            .iter()
            .map(|name| name.as_str().to_string())
            .collect()
    }

    /// The largest number of simultaneously open direct writers observed.
    pub fn peak_writers(&self) -> usize {
        self.state.lock().writers_peak
    }

    /// True once [`OutputArchive::close`] ran.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl EntryContainer for MemArchive {
    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn entries(&self) -> Vec<ArchiveEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|(entry, _)| entry.clone())
            .collect()
    }

    fn entry(&self, name: &EntryName) -> Option<ArchiveEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .find(|(entry, _)| entry.name() == name)
            .map(|(entry, _)| entry.clone())
    }
}

impl InputArchive for MemArchive {
    fn input_stream(&self, name: &EntryName) -> Result<Box<dyn Read + Send>> {
        let state = self.state.lock();
        let data = state
            .entries
            .iter()
            .find(|(entry, _)| entry.name() == name)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| IoError::EntryNotFound(name.clone()))?;
        Ok(Box::new(Cursor::new(data)))
    }
}

impl OutputArchive for MemArchive {
    fn output_stream(
        &mut self,
        entry: &ArchiveEntry,
        template: Option<&ArchiveEntry>,
    ) -> Result<Box<dyn Write + Send>> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(IoError::Closed);
        }
        if state.busy {
            return Err(IoError::OutputBusy);
        }
        let mut entry = entry.clone();
        if let Some(template) = template {
            if entry.size().is_none() {
                if let Some(size) = template.size() {
                    entry = entry.with_size(size);
                }
            }
            if entry.mtime().is_none() {
                if let Some(mtime) = template.mtime() {
                    entry = entry.with_mtime(mtime);
                }
            }
        }
        let name = entry.name().clone();
        match state
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.name() == &name)
        {
            Some(slot) => *slot = (entry, Vec::new()),
            None => state.entries.push((entry, Vec::new())),
        }
        state.busy = true;
        state.writers_now += 1;
        state.writers_peak = state.writers_peak.max(state.writers_now);
        Ok(Box::new(MemWriter {
            state: self.state.clone(),
            name,
            buf: Vec::new(),
        }))
    }

    fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.busy {
            return Err(IoError::OutputBusy);
        }
        state.closed = true;
        Ok(())
    }
}

struct MemWriter {
    state: Arc<Mutex<MemState>>,
    name: EntryName,
    buf: Vec<u8>,
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        let data = std::mem::take(&mut self.buf);
        if let Some((entry, slot)) = state
            .entries
            .iter_mut()
            .find(|(entry, _)| entry.name() == &self.name)
        {
            *entry = entry
                .clone()
                .or_observed(data.len() as u64, Some(SystemTime::now()));
            *slot = data;
        }
        state.commit_order.push(self.name.clone());
        state.busy = false;
        state.writers_now -= 1;
    }
}
