//! A ZIP archive driver for end-to-end federation tests.
//!
//! Nested `zip:` mount points stage writes in memory and rebuild the
//! archive on sync through a [`MultiplexedOutput`] over a temp file that is
//! atomically persisted over the archive path. A path that exists but does
//! not parse as a ZIP archive is reported as a false positive, so the
//! federation layer serves it as a plain host file instead.

#![allow(dead_code)]

use fedfs_addr::EntryName;
use fedfs_file::FileDriver;
use fedfs_io::{
    ArchiveEntry, EntryContainer, EntryKind, IoError, MultiplexedOutput, OutputArchive,
};
use fedfs_kernel::{
    prepare_sync, AccountedRead, AccountedWrite, FsController, FsDriver, FsError, FsModel,
    InputOptions, InputSocket, OutputOptions, OutputSocket, Result, StreamAccountant, StreamKind,
    SyncOptions, SyncReport, SyncWarning,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Routes root mount points to the file driver and nested ones to ZIP
/// controllers.
#[derive(Default)]
pub struct ZipDriver {
    file: FileDriver,
}

impl ZipDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FsDriver for ZipDriver {
    fn new_controller(
        &self,
        model: Arc<FsModel>,
        parent: Option<Arc<dyn FsController>>,
    ) -> Result<Arc<dyn FsController>> {
        match parent {
            None => self.file.new_controller(model, None),
            Some(parent) => Ok(Arc::new(ZipController::new(model, parent)?)),
        }
    }
}

fn map_zip(err: zip::result::ZipError) -> FsError {
    match err {
        zip::result::ZipError::Io(err) => FsError::Io(err),
        // Anything else means the bytes are not a valid archive.
        _ => FsError::FalsePositive,
    }
}

fn map_zip_io(err: zip::result::ZipError) -> IoError {
    match err {
        zip::result::ZipError::Io(err) => IoError::Io(err),
        other => IoError::Io(io::Error::new(io::ErrorKind::InvalidData, other.to_string())),
    }
}

/// Writes staged since the last sync, shared with open sockets.
#[derive(Default)]
struct ZipShared {
    staged: Mutex<BTreeMap<EntryName, Vec<u8>>>,
    removed: Mutex<HashSet<EntryName>>,
}

struct ZipController {
    model: Arc<FsModel>,
    parent: Arc<dyn FsController>,
    archive_path: PathBuf,
    shared: Arc<ZipShared>,
    accountant: Arc<StreamAccountant>,
}

impl ZipController {
    fn new(model: Arc<FsModel>, parent: Arc<dyn FsController>) -> Result<Self> {
        let path = model
            .mount_point()
            .path()
            .map(|p| p.hierarchicalize())
            .ok_or_else(|| FsError::Transient("zip driver needs an opaque mount".to_string()))?;
        // `file:/a/b.zip` minus the scheme prefix is the host path.
        let uri = path.as_str();
        let archive_path = PathBuf::from(uri.trim_start_matches("file:"));
        Ok(Self {
            model,
            parent,
            archive_path,
            shared: Arc::new(ZipShared::default()),
            accountant: Arc::new(StreamAccountant::new()),
        })
    }

    /// The archive's current content, or a false positive signal.
    fn zip_entries(&self) -> Result<BTreeMap<EntryName, Vec<u8>>> {
        let file = match File::open(&self.archive_path) {
            Ok(file) => file,
            // A missing archive is an empty one about to be created.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(FsError::Io(err)),
        };
        let mut archive = ZipArchive::new(file).map_err(map_zip)?;
        let mut entries = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(map_zip)?;
            let Ok(name) = EntryName::parse(file.name().trim_end_matches('/')) else {
                continue;
            };
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            entries.insert(name, data);
        }
        Ok(entries)
    }

    /// Archive content with staged writes and removals applied.
    fn merged(&self) -> Result<BTreeMap<EntryName, Vec<u8>>> {
        let mut entries = self.zip_entries()?;
        for name in self.shared.removed.lock().iter() {
            entries.remove(name);
        }
        for (name, data) in self.shared.staged.lock().iter() {
            entries.insert(name.clone(), data.clone());
        }
        Ok(entries)
    }
}

impl FsController for ZipController {
    fn model(&self) -> &Arc<FsModel> {
        &self.model
    }

    fn parent(&self) -> Option<&Arc<dyn FsController>> {
        Some(&self.parent)
    }

    fn entry(&self, name: &EntryName) -> Result<Option<ArchiveEntry>> {
        let entries = self.merged()?;
        if name.is_root() {
            return Ok(Some(ArchiveEntry::new(name.clone(), EntryKind::Directory)));
        }
        Ok(entries.get(name).map(|data| {
            ArchiveEntry::new(name.clone(), EntryKind::File).with_size(data.len() as u64)
        }))
    }

    fn is_readable(&self, name: &EntryName) -> Result<bool> {
        Ok(self.merged()?.contains_key(name))
    }

    fn is_writable(&self, _name: &EntryName) -> Result<bool> {
        self.merged()?;
        Ok(true)
    }

    fn set_time(&self, name: &EntryName, _mtime: SystemTime) -> Result<()> {
        if self.merged()?.contains_key(name) {
            Ok(())
        } else {
            Err(FsError::EntryNotFound(name.clone()))
        }
    }

    fn input_socket(
        &self,
        name: &EntryName,
        _options: InputOptions,
    ) -> Result<Box<dyn InputSocket>> {
        let data = self
            .merged()?
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::EntryNotFound(name.clone()))?;
        Ok(Box::new(ZipInputSocket {
            name: name.clone(),
            data,
            accountant: self.accountant.clone(),
        }))
    }

    fn output_socket(
        &self,
        name: &EntryName,
        options: OutputOptions,
        _template: Option<ArchiveEntry>,
    ) -> Result<Box<dyn OutputSocket>> {
        let entries = self.merged()?;
        if options.contains(OutputOptions::EXCLUSIVE) && entries.contains_key(name) {
            return Err(FsError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "entry exists",
            )));
        }
        Ok(Box::new(ZipOutputSocket {
            name: name.clone(),
            model: self.model.clone(),
            shared: self.shared.clone(),
            accountant: self.accountant.clone(),
        }))
    }

    fn mknod(
        &self,
        name: &EntryName,
        kind: EntryKind,
        _options: OutputOptions,
        _template: Option<ArchiveEntry>,
    ) -> Result<()> {
        self.merged()?;
        if kind == EntryKind::File {
            self.shared.staged.lock().entry(name.clone()).or_default();
            self.shared.removed.lock().remove(name);
            self.model.touch();
        }
        Ok(())
    }

    fn unlink(&self, name: &EntryName) -> Result<()> {
        let known = self.merged()?.contains_key(name);
        if !known {
            return Err(FsError::EntryNotFound(name.clone()));
        }
        self.shared.staged.lock().remove(name);
        self.shared.removed.lock().insert(name.clone());
        self.model.touch();
        Ok(())
    }

    fn sync(&self, options: SyncOptions, report: &mut SyncReport) -> Result<()> {
        let entries = self.merged()?; // probes; false positives bail out here
        prepare_sync(&self.accountant, options, self.model.mount_point(), report)?;

        if options.contains(SyncOptions::ABORT_CHANGES) {
            self.shared.staged.lock().clear();
            self.shared.removed.lock().clear();
            self.model.set_touched(false);
            return Ok(());
        }
        if !self.model.is_touched() {
            return Ok(());
        }

        let parent_dir = self
            .archive_path
            .parent()
            .ok_or_else(|| FsError::Transient("archive has no parent directory".to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix(".fedfs-zip-")
            .tempfile_in(parent_dir)?;
        let target = ZipTarget::new(temp.reopen()?);
        let mux = MultiplexedOutput::new(target);
        for (name, data) in &entries {
            let entry = ArchiveEntry::new(name.clone(), EntryKind::File)
                .with_size(data.len() as u64);
            let mut stream = mux.output_stream(entry, None)?;
            stream.write_all(data)?;
            stream.close()?;
        }
        mux.close()?;
        for warning in mux.take_warnings() {
            report.warn(SyncWarning::DroppedBuffer {
                mount_point: self.model.mount_point().clone(),
                warning,
            });
        }
        temp.persist(&self.archive_path)
            .map_err(|err| FsError::Io(err.error))?;

        self.shared.staged.lock().clear();
        self.shared.removed.lock().clear();
        self.model.set_touched(false);
        Ok(())
    }
}

struct ZipInputSocket {
    name: EntryName,
    data: Vec<u8>,
    accountant: Arc<StreamAccountant>,
}

impl InputSocket for ZipInputSocket {
    fn entry(&self) -> Result<ArchiveEntry> {
        Ok(ArchiveEntry::new(self.name.clone(), EntryKind::File)
            .with_size(self.data.len() as u64))
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let ticket = self.accountant.open(StreamKind::Input);
        Ok(Box::new(AccountedRead::new(
            Box::new(Cursor::new(self.data.clone())),
            ticket,
        )))
    }
}

struct ZipOutputSocket {
    name: EntryName,
    model: Arc<FsModel>,
    shared: Arc<ZipShared>,
    accountant: Arc<StreamAccountant>,
}

impl OutputSocket for ZipOutputSocket {
    fn entry(&self) -> Result<ArchiveEntry> {
        Ok(ArchiveEntry::new(self.name.clone(), EntryKind::File))
    }

    fn open(&self) -> Result<Box<dyn Write + Send>> {
        let ticket = self.accountant.open(StreamKind::Output);
        Ok(Box::new(AccountedWrite::new(
            Box::new(ZipStagedWriter {
                name: self.name.clone(),
                model: self.model.clone(),
                shared: self.shared.clone(),
                buf: Vec::new(),
            }),
            ticket,
        )))
    }
}

struct ZipStagedWriter {
    name: EntryName,
    model: Arc<FsModel>,
    shared: Arc<ZipShared>,
    buf: Vec<u8>,
}

impl Write for ZipStagedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ZipStagedWriter {
    fn drop(&mut self) {
        self.shared
            .staged
            .lock()
            .insert(self.name.clone(), std::mem::take(&mut self.buf));
        self.shared.removed.lock().remove(&self.name);
        self.model.touch();
    }
}

/// A sequential ZIP writer as an [`OutputArchive`]: one live entry stream,
/// entries recorded as they are started.
pub struct ZipTarget {
    shared: Arc<Mutex<ZipTargetState>>,
}

struct ZipTargetState {
    writer: Option<ZipWriter<File>>,
    entries: Vec<ArchiveEntry>,
    busy: bool,
}

impl ZipTarget {
    pub fn new(file: File) -> Self {
        Self {
            shared: Arc::new(Mutex::new(ZipTargetState {
                writer: Some(ZipWriter::new(file)),
                entries: Vec::new(),
                busy: false,
            })),
        }
    }
}

impl EntryContainer for ZipTarget {
    fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    fn entries(&self) -> Vec<ArchiveEntry> {
        self.shared.lock().entries.clone()
    }

    fn entry(&self, name: &EntryName) -> Option<ArchiveEntry> {
        self.shared
            .lock()
            .entries
            .iter()
            .find(|entry| entry.name() == name)
            .cloned()
    }
}

impl OutputArchive for ZipTarget {
    fn output_stream(
        &mut self,
        entry: &ArchiveEntry,
        _template: Option<&ArchiveEntry>,
    ) -> fedfs_io::Result<Box<dyn Write + Send>> {
        let mut state = self.shared.lock();
        if state.busy {
            return Err(IoError::OutputBusy);
        }
        let writer = state.writer.as_mut().ok_or(IoError::Closed)?;
        let options: FileOptions<()> =
            FileOptions::default().compression_method(CompressionMethod::Stored);
        writer
            .start_file(entry.name().as_str(), options)
            .map_err(map_zip_io)?;
        state.entries.push(entry.clone());
        state.busy = true;
        Ok(Box::new(ZipEntryStream {
            shared: self.shared.clone(),
        }))
    }

    fn close(&mut self) -> fedfs_io::Result<()> {
        let mut state = self.shared.lock();
        if state.busy {
            return Err(IoError::OutputBusy);
        }
        if let Some(writer) = state.writer.take() {
            writer.finish().map_err(map_zip_io)?;
        }
        Ok(())
    }
}

struct ZipEntryStream {
    shared: Arc<Mutex<ZipTargetState>>,
}

impl Write for ZipEntryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.shared.lock();
        match state.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "archive closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ZipEntryStream {
    fn drop(&mut self) {
        self.shared.lock().busy = false;
    }
}

/// Build a ZIP file at `path` from name/content pairs.
pub fn build_zip(path: &std::path::Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options: FileOptions<()> =
        FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, data) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// Read every entry of the ZIP file at `path`.
pub fn read_zip(path: &std::path::Path) -> BTreeMap<String, Vec<u8>> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut out = BTreeMap::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        out.insert(file.name().to_string(), data);
    }
    out
}
