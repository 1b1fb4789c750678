use crate::{
    FsController, FsError, FsModel, InputOptions, InputSocket, OutputOptions, OutputSocket,
    Result, SyncOptions, SyncReport,
};
use fedfs_addr::EntryName;
use fedfs_io::{ArchiveEntry, EntryKind};
use log::trace;
use std::sync::Arc;
use std::time::SystemTime;

/// Resolves false positives by falling back to the parent filesystem.
///
/// The decorated driver controller serves a *prospective* archive: any of
/// its operations may discover that the underlying storage is not actually
/// a valid archive of the declared type and raise
/// [`FsError::FalsePositive`]. This decorator catches that signal per call
/// and re-issues the identical operation against the parent controller,
/// with the entry name re-resolved underneath the archive's own name in
/// the parent.
///
/// The fallback is per-call, not a state transition: a controller may
/// behave as an archive on one call and as a false positive on the next if
/// the underlying storage changes. No verdict is cached here; caching is
/// an external collaborator's concern.
pub struct FederationController {
    model: Arc<FsModel>,
    archive: Arc<dyn FsController>,
    parent: Arc<dyn FsController>,
    /// The archive's entry name within the parent filesystem.
    base: EntryName,
}

impl FederationController {
    /// Decorate a prospective archive controller.
    ///
    /// The archive's mount point must be opaque, i.e. nested in `parent`.
    pub fn new(archive: Arc<dyn FsController>, parent: Arc<dyn FsController>) -> Result<Self> {
        let model = archive.model().clone();
        let base = match model.mount_point().path() {
            Some(path) => path.entry_name().clone(),
            None => {
                return Err(FsError::Transient(
                    "federation requires an opaque mount point".to_string(),
                ))
            }
        };
        Ok(Self {
            model,
            archive,
            parent,
            base,
        })
    }

    /// The entry name seen by the parent when falling back.
    fn parent_name(&self, name: &EntryName) -> EntryName {
        let resolved = self.base.resolve(name);
        trace!(
            "false positive at {}: retrying `{}` as `{}` on parent",
            self.model.mount_point(),
            name,
            resolved
        );
        resolved
    }
}

impl FsController for FederationController {
    fn model(&self) -> &Arc<FsModel> {
        &self.model
    }

    fn parent(&self) -> Option<&Arc<dyn FsController>> {
        Some(&self.parent)
    }

    fn entry(&self, name: &EntryName) -> Result<Option<ArchiveEntry>> {
        match self.archive.entry(name) {
            Err(FsError::FalsePositive) => self.parent.entry(&self.parent_name(name)),
            result => result,
        }
    }

    fn is_readable(&self, name: &EntryName) -> Result<bool> {
        match self.archive.is_readable(name) {
            Err(FsError::FalsePositive) => self.parent.is_readable(&self.parent_name(name)),
            result => result,
        }
    }

    fn is_writable(&self, name: &EntryName) -> Result<bool> {
        match self.archive.is_writable(name) {
            Err(FsError::FalsePositive) => self.parent.is_writable(&self.parent_name(name)),
            result => result,
        }
    }

    fn set_time(&self, name: &EntryName, mtime: SystemTime) -> Result<()> {
        match self.archive.set_time(name, mtime) {
            Err(FsError::FalsePositive) => self.parent.set_time(&self.parent_name(name), mtime),
            result => result,
        }
    }

    fn input_socket(
        &self,
        name: &EntryName,
        options: InputOptions,
    ) -> Result<Box<dyn InputSocket>> {
        match self.archive.input_socket(name, options) {
            Err(FsError::FalsePositive) => {
                self.parent.input_socket(&self.parent_name(name), options)
            }
            result => result,
        }
    }

    fn output_socket(
        &self,
        name: &EntryName,
        options: OutputOptions,
        template: Option<ArchiveEntry>,
    ) -> Result<Box<dyn OutputSocket>> {
        match self.archive.output_socket(name, options, template.clone()) {
            Err(FsError::FalsePositive) => {
                self.parent
                    .output_socket(&self.parent_name(name), options, template)
            }
            result => result,
        }
    }

    fn mknod(
        &self,
        name: &EntryName,
        kind: EntryKind,
        options: OutputOptions,
        template: Option<ArchiveEntry>,
    ) -> Result<()> {
        match self.archive.mknod(name, kind, options, template.clone()) {
            Err(FsError::FalsePositive) => {
                self.parent
                    .mknod(&self.parent_name(name), kind, options, template)
            }
            result => result,
        }
    }

    fn unlink(&self, name: &EntryName) -> Result<()> {
        match self.archive.unlink(name) {
            Err(FsError::FalsePositive) => self.parent.unlink(&self.parent_name(name)),
            result => result,
        }
    }

    fn sync(&self, options: SyncOptions, report: &mut SyncReport) -> Result<()> {
        // A false positive has nothing of its own to commit: all its writes
        // already went to the parent.
        match self.archive.sync(options, report) {
            Err(FsError::FalsePositive) => Ok(()),
            result => result,
        }
    }
}
