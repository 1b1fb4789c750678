//! # fedfs-addr
//!
//! Address model for federated filesystems.
//!
//! This crate provides the immutable value types that name everything in a
//! federation of nested filesystems:
//!
//! - [`Scheme`]: a validated URI scheme token
//! - [`EntryName`]: a normalized relative name for an entry inside one filesystem
//! - [`FsPath`]: a URI denoting an entry, possibly inside a mount point
//! - [`MountPoint`]: the URI identifying the root of one federated filesystem
//!
//! A mount point is either *hierarchical* (an absolute URI whose path ends
//! with `/`, e.g. `file:/home/user/`) or *opaque* (a scheme wrapping a path
//! plus the literal mount-point separator `!/`, e.g. `zip:file:/a/b.zip!/`).
//! Opaque forms nest arbitrarily deep:
//!
//! ```
//! use fedfs_addr::MountPoint;
//!
//! let mp = MountPoint::parse("tar:zip:file:/a/b.zip!/c.tar!/").unwrap();
//! assert_eq!(mp.scheme().as_str(), "tar");
//! assert_eq!(mp.parent().unwrap().to_string(), "zip:file:/a/b.zip!/");
//! assert_eq!(mp.hierarchicalize().to_string(), "file:/a/b.zip/c.tar/");
//! ```
//!
//! All types render back to the exact URI they were parsed from (modulo
//! scheme lowercasing), and parsing failures carry both the offending
//! literal and the violated rule.

mod error;
mod mount;
mod name;
mod path;
mod scheme;

pub use error::{AddressError, Result};
pub use mount::MountPoint;
pub use name::EntryName;
pub use path::FsPath;
pub use scheme::Scheme;

/// The entry name separator within one filesystem.
pub const SEPARATOR: char = '/';

/// The literal separating a mount point from the entry name behind it.
pub const MOUNT_SEPARATOR: &str = "!/";

/// Splits `literal` into a scheme candidate and the rest, if the literal
/// looks like an absolute URI (a `:` before any `/`).
pub(crate) fn split_scheme(literal: &str) -> Option<(&str, &str)> {
    let colon = literal.find(':')?;
    if literal[..colon].contains(SEPARATOR) {
        return None;
    }
    Some((&literal[..colon], &literal[colon + 1..]))
}

/// True if any `/`-separated segment of `path` is `.` or `..`.
pub(crate) fn contains_dot_segment(path: &str) -> bool {
    path.split(SEPARATOR).any(|seg| seg == "." || seg == "..")
}
