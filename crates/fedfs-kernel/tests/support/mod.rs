//! An in-memory driver exercising the full federation surface.
//!
//! Every filesystem is a map of entry name to content, keyed by mount
//! point in a shared world state. Archives write themselves back into
//! their parent on sync, so touch propagation and bottom-up ordering are
//! observable from the outside.

#![allow(dead_code)]

use fedfs_addr::{EntryName, MountPoint};
use fedfs_io::{ArchiveEntry, EntryKind};
use fedfs_kernel::{
    prepare_sync, AccountedRead, AccountedWrite, FsController, FsDriver, FsError, FsModel,
    InputOptions, InputSocket, OutputOptions, OutputSocket, Result, StreamAccountant, StreamKind,
    SyncOptions, SyncReport,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::time::SystemTime;

type Tree = BTreeMap<EntryName, Vec<u8>>;

/// Shared world state behind every controller the driver builds.
#[derive(Default)]
pub struct TestState {
    pub trees: Mutex<HashMap<MountPoint, Tree>>,
    /// Mount points currently behaving as false positives.
    pub false_positives: Mutex<HashSet<MountPoint>>,
    /// Mount points currently failing with a transient error.
    pub transients: Mutex<HashSet<MountPoint>>,
    /// Mount points in the order their sync ran.
    pub sync_log: Mutex<Vec<MountPoint>>,
    /// Mount points in the order their controllers were built.
    pub build_log: Mutex<Vec<MountPoint>>,
}

impl TestState {
    pub fn content(&self, mount_point: &MountPoint, name: &str) -> Option<Vec<u8>> {
        let name = EntryName::parse(name).unwrap();
        self.trees
            .lock()
            .get(mount_point)
            .and_then(|tree| tree.get(&name).cloned())
    }

    pub fn set_false_positive(&self, mount_point: &MountPoint, yes: bool) {
        let mut set = self.false_positives.lock();
        if yes {
            set.insert(mount_point.clone());
        } else {
            set.remove(mount_point);
        }
    }

    pub fn builds_of(&self, mount_point: &MountPoint) -> usize {
        self.build_log
            .lock()
            .iter()
            .filter(|mp| *mp == mount_point)
            .count()
    }
}

pub struct TestDriver {
    pub state: Arc<TestState>,
}

impl TestDriver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TestState::default()),
        }
    }
}

impl FsDriver for TestDriver {
    fn new_controller(
        &self,
        model: Arc<FsModel>,
        parent: Option<Arc<dyn FsController>>,
    ) -> Result<Arc<dyn FsController>> {
        self.state
            .build_log
            .lock()
            .push(model.mount_point().clone());
        Ok(Arc::new(TestController {
            model,
            parent,
            state: self.state.clone(),
            accountant: Arc::new(StreamAccountant::new()),
        }))
    }
}

struct TestController {
    model: Arc<FsModel>,
    parent: Option<Arc<dyn FsController>>,
    state: Arc<TestState>,
    accountant: Arc<StreamAccountant>,
}

impl TestController {
    /// Mimic a driver probing its storage: nested mount points may turn
    /// out to be transiently unavailable or no archive at all.
    fn probe(&self) -> Result<()> {
        let mp = self.model.mount_point();
        if self.parent.is_some() {
            if self.state.transients.lock().contains(mp) {
                return Err(FsError::Transient("storage unavailable".to_string()));
            }
            if self.state.false_positives.lock().contains(mp) {
                return Err(FsError::FalsePositive);
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &EntryName) -> Option<Vec<u8>> {
        self.state
            .trees
            .lock()
            .get(self.model.mount_point())
            .and_then(|tree| tree.get(name).cloned())
    }

    /// One line per entry, stable order: what sync writes into the parent.
    fn serialize(&self) -> Vec<u8> {
        let trees = self.state.trees.lock();
        let mut out = String::new();
        if let Some(tree) = trees.get(self.model.mount_point()) {
            for (name, data) in tree {
                out.push_str(&format!("{}:{}\n", name, data.len()));
            }
        }
        out.into_bytes()
    }
}

impl FsController for TestController {
    fn model(&self) -> &Arc<FsModel> {
        &self.model
    }

    fn parent(&self) -> Option<&Arc<dyn FsController>> {
        self.parent.as_ref()
    }

    fn entry(&self, name: &EntryName) -> Result<Option<ArchiveEntry>> {
        self.probe()?;
        if name.is_root() {
            return Ok(Some(ArchiveEntry::new(name.clone(), EntryKind::Directory)));
        }
        Ok(self.lookup(name).map(|data| {
            ArchiveEntry::new(name.clone(), EntryKind::File).with_size(data.len() as u64)
        }))
    }

    fn is_readable(&self, name: &EntryName) -> Result<bool> {
        self.probe()?;
        Ok(self.lookup(name).is_some())
    }

    fn is_writable(&self, name: &EntryName) -> Result<bool> {
        self.probe()?;
        Ok(true)
    }

    fn set_time(&self, name: &EntryName, _mtime: SystemTime) -> Result<()> {
        self.probe()?;
        match self.lookup(name) {
            Some(_) => Ok(()),
            None => Err(FsError::EntryNotFound(name.clone())),
        }
    }

    fn input_socket(
        &self,
        name: &EntryName,
        _options: InputOptions,
    ) -> Result<Box<dyn InputSocket>> {
        self.probe()?;
        Ok(Box::new(TestInputSocket {
            state: self.state.clone(),
            mount_point: self.model.mount_point().clone(),
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
        self.probe()?;
        if options.contains(OutputOptions::EXCLUSIVE) && self.lookup(name).is_some() {
            return Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "entry exists",
            )));
        }
        Ok(Box::new(TestOutputSocket {
            state: self.state.clone(),
            model: self.model.clone(),
            name: name.clone(),
            accountant: self.accountant.clone(),
        }))
    }

    fn mknod(
        &self,
        name: &EntryName,
        _kind: EntryKind,
        options: OutputOptions,
        _template: Option<ArchiveEntry>,
    ) -> Result<()> {
        self.probe()?;
        let mut trees = self.state.trees.lock();
        let tree = trees.entry(self.model.mount_point().clone()).or_default();
        if tree.contains_key(name) {
            if options.contains(OutputOptions::EXCLUSIVE) {
                return Err(FsError::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "entry exists",
                )));
            }
            return Ok(());
        }
        tree.insert(name.clone(), Vec::new());
        drop(trees);
        self.model.touch();
        Ok(())
    }

    fn unlink(&self, name: &EntryName) -> Result<()> {
        self.probe()?;
        let mut trees = self.state.trees.lock();
        let tree = trees.entry(self.model.mount_point().clone()).or_default();
        if tree.remove(name).is_none() {
            return Err(FsError::EntryNotFound(name.clone()));
        }
        drop(trees);
        self.model.touch();
        Ok(())
    }

    fn sync(&self, options: SyncOptions, report: &mut SyncReport) -> Result<()> {
        self.probe()?;
        let mount_point = self.model.mount_point().clone();
        prepare_sync(&self.accountant, options, &mount_point, report)?;
        self.state.sync_log.lock().push(mount_point.clone());

        if !options.contains(SyncOptions::ABORT_CHANGES) && self.model.is_touched() {
            // Write this filesystem back into its parent storage.
            if let (Some(parent), Some(path)) = (&self.parent, mount_point.path()) {
                let socket =
                    parent.output_socket(path.entry_name(), OutputOptions::empty(), None)?;
                let mut stream = socket.open()?;
                stream.write_all(&self.serialize())?;
                stream.flush()?;
            }
        }
        self.model.set_touched(false);
        Ok(())
    }
}

struct TestInputSocket {
    state: Arc<TestState>,
    mount_point: MountPoint,
    name: EntryName,
    accountant: Arc<StreamAccountant>,
}

impl InputSocket for TestInputSocket {
    fn entry(&self) -> Result<ArchiveEntry> {
        let data = self
            .state
            .trees
            .lock()
            .get(&self.mount_point)
            .and_then(|tree| tree.get(&self.name).cloned())
            .ok_or_else(|| FsError::EntryNotFound(self.name.clone()))?;
        Ok(ArchiveEntry::new(self.name.clone(), EntryKind::File).with_size(data.len() as u64))
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let data = self
            .state
            .trees
            .lock()
            .get(&self.mount_point)
            .and_then(|tree| tree.get(&self.name).cloned())
            .ok_or_else(|| FsError::EntryNotFound(self.name.clone()))?;
        let ticket = self.accountant.open(StreamKind::Input);
        Ok(Box::new(AccountedRead::new(
            Box::new(Cursor::new(data)),
            ticket,
        )))
    }
}

struct TestOutputSocket {
    state: Arc<TestState>,
    model: Arc<FsModel>,
    name: EntryName,
    accountant: Arc<StreamAccountant>,
}

impl OutputSocket for TestOutputSocket {
    fn entry(&self) -> Result<ArchiveEntry> {
        Ok(ArchiveEntry::new(self.name.clone(), EntryKind::File))
    }

    fn open(&self) -> Result<Box<dyn Write + Send>> {
        let ticket = self.accountant.open(StreamKind::Output);
        Ok(Box::new(AccountedWrite::new(
            Box::new(TestWriter {
                state: self.state.clone(),
                model: self.model.clone(),
                name: self.name.clone(),
                buf: Vec::new(),
            }),
            ticket,
        )))
    }
}

/// Buffers written bytes and commits them to the tree when dropped.
struct TestWriter {
    state: Arc<TestState>,
    model: Arc<FsModel>,
    name: EntryName,
    buf: Vec<u8>,
}

impl Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for TestWriter {
    fn drop(&mut self) {
        let mut trees = self.state.trees.lock();
        trees
            .entry(self.model.mount_point().clone())
            .or_default()
            .insert(self.name.clone(), std::mem::take(&mut self.buf));
        drop(trees);
        self.model.touch();
    }
}
