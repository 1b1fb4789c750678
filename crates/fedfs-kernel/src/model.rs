use fedfs_addr::MountPoint;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies a registered touch listener for later removal.
pub type ListenerId = u64;

type TouchListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Per-filesystem mutable state shared by a controller chain.
///
/// A model is created when its controller chain is built and lives until
/// the manager drops it from the registry. The `touched` flag records
/// pending, unsynchronized writes; listeners are notified synchronously on
/// every transition, never on no-op sets.
pub struct FsModel {
    mount_point: MountPoint,
    parent: Option<Arc<FsModel>>,
    touched: Mutex<bool>,
    listeners: Mutex<Vec<(ListenerId, TouchListener)>>,
    next_listener: AtomicU64,
}

impl FsModel {
    /// Create the model for one federated filesystem.
    pub fn new(mount_point: MountPoint, parent: Option<Arc<FsModel>>) -> Arc<Self> {
        Arc::new(Self {
            mount_point,
            parent,
            touched: Mutex::new(false),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        })
    }

    /// The mount point this model belongs to.
    pub fn mount_point(&self) -> &MountPoint {
        &self.mount_point
    }

    /// The parent filesystem's model, absent for root filesystems.
    pub fn parent(&self) -> Option<&Arc<FsModel>> {
        self.parent.as_ref()
    }

    /// True while the filesystem has pending, unsynchronized writes.
    pub fn is_touched(&self) -> bool {
        *self.touched.lock()
    }

    /// Flip the touched flag, notifying listeners on actual transitions.
    pub fn set_touched(&self, touched: bool) {
        {
            let mut current = self.touched.lock();
            if *current == touched {
                return;
            }
            *current = touched;
        }
        // Notify outside the flag lock from a snapshot, so listeners may
        // inspect the model or unsubscribe without deadlocking.
        let snapshot: Vec<TouchListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(touched);
        }
    }

    /// Mark the filesystem dirty. Shorthand for write paths.
    pub fn touch(&self) {
        self.set_touched(true);
    }

    /// Subscribe to touched-state transitions.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Unsubscribe a previously registered listener.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(lid, _)| *lid != id);
    }
}

impl std::fmt::Debug for FsModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsModel")
            .field("mount_point", &self.mount_point.as_str())
            .field("touched", &self.is_touched())
            .finish()
    }
}
