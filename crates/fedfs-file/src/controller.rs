use crate::FILE_SCHEME;
use fedfs_addr::EntryName;
use fedfs_io::{ArchiveEntry, EntryKind};
use fedfs_kernel::{
    prepare_sync, AccountedRead, AccountedWrite, FsController, FsError, FsModel, InputOptions,
    InputSocket, OutputOptions, OutputSocket, Result, StreamAccountant, StreamKind, SyncOptions,
    SyncReport,
};
use log::{trace, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::NamedTempFile;

/// Serves a hierarchical `file:` mount point from a host directory.
///
/// Writes go through a temp file in the destination directory and are
/// persisted atomically when the stream closes. The host filesystem writes
/// through immediately, so its model is never touched and sync only has to
/// settle the stream options.
pub struct FileController {
    model: Arc<FsModel>,
    root: PathBuf,
    accountant: Arc<StreamAccountant>,
}

impl FileController {
    pub fn new(model: Arc<FsModel>) -> Result<Self> {
        let mount_point = model.mount_point();
        if !mount_point.is_hierarchical() || mount_point.scheme().as_str() != FILE_SCHEME {
            return Err(FsError::Transient(format!(
                "not a file mount point: {mount_point}"
            )));
        }
        let root = PathBuf::from(&mount_point.as_str()[FILE_SCHEME.len() + 1..]);
        Ok(Self {
            model,
            root,
            accountant: Arc::new(StreamAccountant::new()),
        })
    }

    /// The directory this controller serves.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &EntryName) -> PathBuf {
        // Entry names are normalized: no rooted, empty or dot segments can
        // escape the root directory.
        self.root.join(name.as_str())
    }
}

fn entry_from_metadata(name: &EntryName, metadata: &fs::Metadata) -> ArchiveEntry {
    let kind = if metadata.is_dir() {
        EntryKind::Directory
    } else if metadata.is_file() {
        EntryKind::File
    } else {
        EntryKind::Special
    };
    let mut entry = ArchiveEntry::new(name.clone(), kind);
    if metadata.is_file() {
        entry = entry.with_size(metadata.len());
    }
    if let Ok(mtime) = metadata.modified() {
        entry = entry.with_mtime(mtime);
    }
    entry
}

fn map_io(err: io::Error, name: &EntryName) -> FsError {
    match err.kind() {
        io::ErrorKind::NotFound => FsError::EntryNotFound(name.clone()),
        _ => FsError::Io(err),
    }
}

impl FsController for FileController {
    fn model(&self) -> &Arc<FsModel> {
        &self.model
    }

    fn parent(&self) -> Option<&Arc<dyn FsController>> {
        None
    }

    fn entry(&self, name: &EntryName) -> Result<Option<ArchiveEntry>> {
        match fs::metadata(self.resolve(name)) {
            Ok(metadata) => Ok(Some(entry_from_metadata(name, &metadata))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(FsError::Io(err)),
        }
    }

    fn is_readable(&self, name: &EntryName) -> Result<bool> {
        Ok(fs::metadata(self.resolve(name)).is_ok())
    }

    fn is_writable(&self, name: &EntryName) -> Result<bool> {
        let path = self.resolve(name);
        match fs::metadata(&path) {
            Ok(metadata) => Ok(!metadata.permissions().readonly()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Ok(path.parent().map(Path::is_dir).unwrap_or(false))
            }
            Err(err) => Err(FsError::Io(err)),
        }
    }

    fn set_time(&self, name: &EntryName, mtime: SystemTime) -> Result<()> {
        let path = self.resolve(name);
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|err| map_io(err, name))?;
        file.set_modified(mtime).map_err(|err| map_io(err, name))
    }

    fn input_socket(
        &self,
        name: &EntryName,
        _options: InputOptions,
    ) -> Result<Box<dyn InputSocket>> {
        Ok(Box::new(FileInputSocket {
            path: self.resolve(name),
            name: name.clone(),
            accountant: self.accountant.clone(),
        }))
    }

    fn output_socket(
        &self,
        name: &EntryName,
        options: OutputOptions,
        _template: Option<ArchiveEntry>,
    ) -> Result<Box<dyn OutputSocket>> {
        Ok(Box::new(FileOutputSocket {
            path: self.resolve(name),
            name: name.clone(),
            options,
            accountant: self.accountant.clone(),
        }))
    }

    fn mknod(
        &self,
        name: &EntryName,
        kind: EntryKind,
        options: OutputOptions,
        _template: Option<ArchiveEntry>,
    ) -> Result<()> {
        let path = self.resolve(name);
        if let Some(parent) = path.parent() {
            if options.contains(OutputOptions::CREATE_PARENTS) {
                fs::create_dir_all(parent).map_err(|err| map_io(err, name))?;
            }
        }
        match kind {
            EntryKind::Directory => match fs::create_dir(&path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    if options.contains(OutputOptions::EXCLUSIVE) {
                        Err(FsError::Io(err))
                    } else {
                        Ok(())
                    }
                }
                Err(err) => Err(map_io(err, name)),
            },
            EntryKind::File => {
                let mut open = OpenOptions::new();
                open.write(true);
                if options.contains(OutputOptions::EXCLUSIVE) {
                    open.create_new(true);
                } else {
                    open.create(true);
                }
                open.open(&path).map_err(|err| map_io(err, name))?;
                Ok(())
            }
            EntryKind::Special => Err(FsError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "special entries are not supported on the host filesystem",
            ))),
        }
    }

    fn unlink(&self, name: &EntryName) -> Result<()> {
        let path = self.resolve(name);
        let metadata = fs::metadata(&path).map_err(|err| map_io(err, name))?;
        if metadata.is_dir() {
            fs::remove_dir(&path).map_err(|err| map_io(err, name))
        } else {
            fs::remove_file(&path).map_err(|err| map_io(err, name))
        }
    }

    fn sync(&self, options: SyncOptions, report: &mut SyncReport) -> Result<()> {
        // Host writes are already durable; only the stream options apply.
        trace!("file sync on {}", self.model.mount_point());
        prepare_sync(&self.accountant, options, self.model.mount_point(), report)
    }
}

struct FileInputSocket {
    path: PathBuf,
    name: EntryName,
    accountant: Arc<StreamAccountant>,
}

impl InputSocket for FileInputSocket {
    fn entry(&self) -> Result<ArchiveEntry> {
        let metadata = fs::metadata(&self.path).map_err(|err| map_io(err, &self.name))?;
        Ok(entry_from_metadata(&self.name, &metadata))
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let file = File::open(&self.path).map_err(|err| map_io(err, &self.name))?;
        let ticket = self.accountant.open(StreamKind::Input);
        Ok(Box::new(AccountedRead::new(Box::new(file), ticket)))
    }
}

struct FileOutputSocket {
    path: PathBuf,
    name: EntryName,
    options: OutputOptions,
    accountant: Arc<StreamAccountant>,
}

impl OutputSocket for FileOutputSocket {
    fn entry(&self) -> Result<ArchiveEntry> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(entry_from_metadata(&self.name, &metadata)),
            Err(_) => Ok(ArchiveEntry::new(self.name.clone(), EntryKind::File)),
        }
    }

    fn open(&self) -> Result<Box<dyn Write + Send>> {
        if self.options.contains(OutputOptions::EXCLUSIVE) && self.path.exists() {
            return Err(FsError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "entry exists",
            )));
        }
        let parent = self
            .path
            .parent()
            .ok_or_else(|| FsError::EntryNotFound(self.name.clone()))?;
        if self.options.contains(OutputOptions::CREATE_PARENTS) {
            fs::create_dir_all(parent).map_err(|err| map_io(err, &self.name))?;
        }
        let ticket = self.accountant.open(StreamKind::Output);
        if self.options.contains(OutputOptions::APPEND) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|err| map_io(err, &self.name))?;
            return Ok(Box::new(AccountedWrite::new(Box::new(file), ticket)));
        }
        // Stage in a temp file next to the destination and persist on
        // close, so readers never observe a half-written entry.
        let temp = tempfile::Builder::new()
            .prefix(".fedfs-")
            .tempfile_in(parent)
            .map_err(|err| map_io(err, &self.name))?;
        Ok(Box::new(AccountedWrite::new(
            Box::new(PersistWriter {
                temp: Some(temp),
                dest: self.path.clone(),
            }),
            ticket,
        )))
    }
}

/// Writes into a temp file, atomically renamed over the destination when
/// the stream is dropped.
struct PersistWriter {
    temp: Option<NamedTempFile>,
    dest: PathBuf,
}

impl Write for PersistWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.temp.as_mut() {
            Some(temp) => temp.as_file_mut().write(buf),
            None => Err(io::Error::new(io::ErrorKind::Other, "stream is closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.temp.as_mut() {
            Some(temp) => temp.as_file_mut().flush(),
            None => Ok(()),
        }
    }
}

impl Drop for PersistWriter {
    fn drop(&mut self) {
        if let Some(temp) = self.temp.take() {
            if let Err(err) = temp.persist(&self.dest) {
                warn!("could not persist {:?}: {}", self.dest, err.error);
            }
        }
    }
}
