//! # fedfs-file
//!
//! Host-filesystem driver for fedfs federations.
//!
//! Every federation is rooted in a hierarchical mount point served by the
//! host filesystem; archive drivers nest on top of it. This crate maps
//! `file:` mount points onto directories:
//!
//! - [`FileDriver`]: builds root controllers for `file:/abs/dir/` mount
//!   points
//! - [`FileController`]: maps the controller operations onto `std::fs`,
//!   with writes staged in a temp file and atomically persisted on close
//!
//! ```ignore
//! use fedfs_addr::MountPoint;
//! use fedfs_file::FileDriver;
//! use fedfs_kernel::FsManager;
//!
//! let manager = FsManager::new();
//! let root = MountPoint::parse("file:/var/data/")?;
//! let controller = manager.controller(&root, &FileDriver::new())?;
//! ```

mod controller;
mod driver;

pub use controller::FileController;
pub use driver::FileDriver;

/// The URI scheme this driver serves.
pub const FILE_SCHEME: &str = "file";
