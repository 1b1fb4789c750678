use crate::FileController;
use fedfs_kernel::{FsController, FsDriver, FsError, FsModel, Result};
use std::sync::Arc;

/// Builds [`FileController`]s for hierarchical `file:` mount points.
///
/// The host filesystem roots a federation; it never nests inside another
/// filesystem, so a parent controller is rejected.
#[derive(Debug, Default)]
pub struct FileDriver;

impl FileDriver {
    pub fn new() -> Self {
        Self
    }
}

impl FsDriver for FileDriver {
    fn new_controller(
        &self,
        model: Arc<FsModel>,
        parent: Option<Arc<dyn FsController>>,
    ) -> Result<Arc<dyn FsController>> {
        if parent.is_some() {
            return Err(FsError::Transient(format!(
                "the file driver roots federations, it cannot nest: {}",
                model.mount_point()
            )));
        }
        Ok(Arc::new(FileController::new(model)?))
    }
}
