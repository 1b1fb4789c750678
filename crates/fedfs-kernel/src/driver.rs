use crate::{FsController, FsModel, Result};
use std::sync::Arc;

/// Builds controllers for the federation manager.
///
/// A driver must be pure with respect to addressing: the controller it
/// builds may depend only on the model's mount point and the given parent,
/// never on hidden global state keyed differently. It is invoked inside the
/// manager's critical section and must not call back into the manager.
pub trait FsDriver: Send + Sync {
    /// Build the controller for the filesystem described by `model`.
    ///
    /// `parent` is the controller of the filesystem the mount point nests
    /// in, absent for root filesystems. For nested mount points the driver
    /// returns the *prospective* archive controller; the manager wraps it
    /// in the federation decorator chain.
    fn new_controller(
        &self,
        model: Arc<FsModel>,
        parent: Option<Arc<dyn FsController>>,
    ) -> Result<Arc<dyn FsController>>;
}
