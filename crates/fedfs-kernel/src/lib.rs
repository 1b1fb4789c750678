//! # fedfs-kernel
//!
//! Federation kernel for nested virtual filesystems.
//!
//! This crate composes the address model (`fedfs-addr`) and the archive I/O
//! abstraction (`fedfs-io`) into a federation of mutable filesystems:
//!
//! - [`FsController`]: the operation set every filesystem node implements
//! - [`FederationController`]: the decorator resolving false positives by
//!   falling back to the parent filesystem, per call
//! - [`FsModel`]: per-filesystem touched state with synchronous listeners
//! - [`FsManager`]: the registry mapping mount points to controller chains,
//!   with a pinned/evictable retention policy driven by the touched state
//!   and bottom-up synchronization scheduling
//! - [`SyncOptions`]/[`SyncReport`]: the synchronization protocol and its
//!   warning/fatal exception taxonomy
//! - [`StreamAccountant`]: per-thread open-stream accounting behind the
//!   WAIT_CLOSE_*/FORCE_CLOSE_* options
//!
//! ## Example
//!
//! ```ignore
//! use fedfs_kernel::{FsManager, SyncOptions};
//! use fedfs_addr::MountPoint;
//!
//! let manager = FsManager::new();
//! let mount = MountPoint::parse("zip:file:/data/logs.zip!/")?;
//! let controller = manager.controller(&mount, &driver)?;
//! // ... read and write entries through the controller ...
//! manager.sync_all(SyncOptions::UMOUNT)?;
//! ```

mod accountant;
mod config;
mod controller;
mod driver;
mod error;
mod federation;
mod manager;
mod model;
mod stats;
mod sync;

pub use accountant::{
    prepare_sync, AccountedRead, AccountedWrite, StreamAccountant, StreamTicket,
};
pub use config::KernelConfig;
pub use controller::{
    FsController, InputOptions, InputSocket, OutputOptions, OutputSocket,
};
pub use driver::FsDriver;
pub use error::{FsError, Result};
pub use federation::FederationController;
pub use manager::FsManager;
pub use model::{FsModel, ListenerId};
pub use stats::{StatisticsController, StatsSnapshot};
pub use sync::{
    PropagateSync, StreamKind, SyncError, SyncFatal, SyncHandler, SyncOptions, SyncReport,
    SyncWarning,
};
