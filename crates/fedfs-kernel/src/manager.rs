use crate::{
    FederationController, FsController, FsDriver, FsError, FsModel, KernelConfig, PropagateSync,
    Result, StatisticsController, StatsSnapshot, SyncError, SyncFatal, SyncHandler, SyncOptions,
    SyncReport,
};
use crate::stats::ByteTotals;
use chrono::Utc;
use fedfs_addr::MountPoint;
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

/// The two-state retention policy for a registered controller.
///
/// A touched filesystem is pinned until synchronized; an untouched one is
/// evictable, so an idle nested archive can be dropped and rebuilt lazily.
/// Eviction is observed (the weak handle no longer upgrades), never
/// scheduled, so correctness does not depend on collector timing.
enum Link {
    Pinned(Arc<dyn FsController>),
    Evictable(Weak<dyn FsController>),
}

impl Link {
    fn get(&self) -> Option<Arc<dyn FsController>> {
        match self {
            Link::Pinned(controller) => Some(controller.clone()),
            Link::Evictable(weak) => weak.upgrade(),
        }
    }

    fn pin(&mut self, controller: Arc<dyn FsController>) {
        *self = Link::Pinned(controller);
    }

    fn evict(&mut self, controller: &Arc<dyn FsController>) {
        *self = Link::Evictable(Arc::downgrade(controller));
    }
}

struct ManagerInner {
    registry: Mutex<BTreeMap<MountPoint, Link>>,
    config: KernelConfig,
    totals: ByteTotals,
}

/// Maps mount points to controller chains and schedules synchronization
/// across them.
///
/// One coarse lock guards the link table; it is never held during I/O. The
/// manager is an explicit context object: construct one at process start
/// and pass it into every API entry point.
pub struct FsManager {
    inner: Arc<ManagerInner>,
}

impl Default for FsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FsManager {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                registry: Mutex::new(BTreeMap::new()),
                config,
                totals: ByteTotals::default(),
            }),
        }
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    /// Obtain the controller for `mount_point`, building and registering
    /// the chain on demand.
    ///
    /// Root filesystems (mount points without a parent) delegate directly
    /// to the driver and are not registered. Nested mount points resolve
    /// their whole parent chain inside a single critical section without
    /// re-entering the lock, so deeply nested mount points cannot deadlock.
    pub fn controller(
        &self,
        mount_point: &MountPoint,
        driver: &dyn FsDriver,
    ) -> Result<Arc<dyn FsController>> {
        if mount_point.parent().is_none() {
            let model = FsModel::new(mount_point.clone(), None);
            return driver.new_controller(model, None);
        }
        let mut registry = self.inner.registry.lock();
        self.controller_locked(&mut registry, mount_point, driver)
    }

    fn controller_locked(
        &self,
        registry: &mut BTreeMap<MountPoint, Link>,
        mount_point: &MountPoint,
        driver: &dyn FsDriver,
    ) -> Result<Arc<dyn FsController>> {
        if let Some(link) = registry.get(mount_point) {
            if let Some(controller) = link.get() {
                trace!("manager: live link for {}", mount_point);
                return Ok(controller);
            }
        }
        let parent_mp = match mount_point.parent() {
            Some(parent) => parent,
            None => {
                // Roots are never registered; build one inline.
                let model = FsModel::new(mount_point.clone(), None);
                return driver.new_controller(model, None);
            }
        };
        let parent = self.controller_locked(registry, &parent_mp, driver)?;
        let model = FsModel::new(mount_point.clone(), Some(parent.model().clone()));
        let archive = driver.new_controller(model.clone(), Some(parent.clone()))?;
        let federated: Arc<dyn FsController> =
            Arc::new(FederationController::new(archive, parent)?);
        let controller: Arc<dyn FsController> = if is_top_level(mount_point) {
            Arc::new(StatisticsController::new(
                federated,
                self.inner.totals.read.clone(),
                self.inner.totals.written.clone(),
            ))
        } else {
            federated
        };

        // The touch listener drives the link's retention policy: pinned
        // while touched, evictable otherwise. Notification reaches the
        // registry through a weak handle and the mount point key, so the
        // model never owns a path back to the manager.
        let weak_inner = Arc::downgrade(&self.inner);
        let weak_controller = Arc::downgrade(&controller);
        let key = mount_point.clone();
        let retain_untouched = self.inner.config.retain_untouched;
        model.add_listener(move |touched| {
            let Some(inner) = weak_inner.upgrade() else {
                return;
            };
            let mut registry = inner.registry.lock();
            let Some(link) = registry.get_mut(&key) else {
                return;
            };
            if touched || retain_untouched {
                if let Some(controller) = weak_controller.upgrade() {
                    link.pin(controller);
                }
            } else if let Some(controller) = link.get() {
                link.evict(&controller);
            }
        });

        let link = if self.inner.config.retain_untouched {
            Link::Pinned(controller.clone())
        } else {
            Link::Evictable(Arc::downgrade(&controller))
        };
        registry.insert(mount_point.clone(), link);
        debug!("manager: registered {}", mount_point);
        Ok(controller)
    }

    /// Synchronize every live filesystem, bottom-up.
    pub fn sync_all(&self, options: SyncOptions) -> std::result::Result<(), SyncError> {
        self.sync_all_with(options, &mut PropagateSync)
    }

    /// Like [`FsManager::sync_all`], handing the outcome to `handler` for
    /// final disposition.
    pub fn sync_all_with(
        &self,
        options: SyncOptions,
        handler: &mut dyn SyncHandler,
    ) -> std::result::Result<(), SyncError> {
        handler.handle(self.sync_pass(None, options))
    }

    /// Synchronize one federated subtree, bottom-up.
    pub fn sync(
        &self,
        scope: &MountPoint,
        options: SyncOptions,
    ) -> std::result::Result<(), SyncError> {
        self.sync_pass(Some(scope), options)
    }

    fn sync_pass(
        &self,
        scope: Option<&MountPoint>,
        options: SyncOptions,
    ) -> std::result::Result<(), SyncError> {
        options.validate()?;
        let snapshot = self.snapshot(scope);
        let mut report = SyncReport::new();
        for (mount_point, controller) in snapshot {
            debug!("manager: syncing {}", mount_point);
            if let Err(err) = controller.sync(options, &mut report) {
                return match err {
                    FsError::Sync(SyncError::Busy) => Err(SyncError::Busy),
                    FsError::Sync(SyncError::IllegalOptions(options)) => {
                        Err(SyncError::IllegalOptions(options))
                    }
                    cause => Err(report.finish_fatal(SyncFatal {
                        mount_point,
                        cause: Box::new(cause),
                    })),
                };
            }
        }
        if scope.is_none() {
            self.inner.totals.reset();
        }
        report.finish()
    }

    /// Live controllers, dead links pruned, ordered bottom-up.
    ///
    /// A controller must never be synchronized before any controller whose
    /// mount point nests inside it, so the snapshot is sorted by
    /// hierarchicalized mount point URI in descending order: a nested
    /// mount point's URI extends its parent's and therefore sorts after
    /// it.
    fn snapshot(&self, scope: Option<&MountPoint>) -> Vec<(MountPoint, Arc<dyn FsController>)> {
        let scope_key = scope.map(|mp| mp.hierarchicalize().as_str().to_string());
        let mut live: Vec<(String, MountPoint, Arc<dyn FsController>)> = Vec::new();
        let mut registry = self.inner.registry.lock();
        registry.retain(|mount_point, link| match link.get() {
            Some(controller) => {
                let key = mount_point.hierarchicalize().as_str().to_string();
                let selected = scope_key
                    .as_deref()
                    .map(|prefix| key.starts_with(prefix))
                    .unwrap_or(true);
                if selected {
                    live.push((key, mount_point.clone(), controller));
                }
                true
            }
            None => {
                trace!("manager: pruning dead link for {}", mount_point);
                false
            }
        });
        drop(registry);
        live.sort_by(|a, b| b.0.cmp(&a.0));
        live.into_iter().map(|(_, mp, c)| (mp, c)).collect()
    }

    /// A point-in-time statistics snapshot for external monitoring.
    pub fn statistics(&self) -> StatsSnapshot {
        let mut filesystems = 0;
        let mut touched = 0;
        let mut top_level = 0;
        let mut top_level_touched = 0;
        let mut registry = self.inner.registry.lock();
        registry.retain(|mount_point, link| match link.get() {
            Some(controller) => {
                filesystems += 1;
                let is_touched = controller.model().is_touched();
                if is_touched {
                    touched += 1;
                }
                if is_top_level(mount_point) {
                    top_level += 1;
                    if is_touched {
                        top_level_touched += 1;
                    }
                }
                true
            }
            None => false,
        });
        drop(registry);
        StatsSnapshot {
            filesystems,
            touched,
            top_level,
            top_level_touched,
            bytes_read: self.inner.totals.read.load(Ordering::Relaxed),
            bytes_written: self.inner.totals.written.load(Ordering::Relaxed),
            taken_at: Utc::now(),
        }
    }
}

/// True for filesystems mounted directly on a root filesystem.
fn is_top_level(mount_point: &MountPoint) -> bool {
    match mount_point.parent() {
        Some(parent) => parent.parent().is_none(),
        None => false,
    }
}
