//! # fedfs-io
//!
//! Archive entry I/O abstraction for federated filesystems.
//!
//! This crate provides:
//! - [`ArchiveEntry`]: size/time/kind-tagged entry records
//! - [`EntryContainer`], [`InputArchive`], [`OutputArchive`]: the container
//!   and stream-factory traits archive drivers implement
//! - [`MultiplexedOutput`]: a decorator hiding the "at most one live entry
//!   output stream" limit of sequentially written archive formats by
//!   buffering additional writes in temp files and draining them in order
//! - [`CountingRead`]/[`CountingWrite`]: byte-counting stream adapters for
//!   the statistics interface
//!
//! ## Multiplexing
//!
//! Archive formats are written sequentially: the real target can serve only
//! one live entry output stream at a time. [`MultiplexedOutput`] hides that
//! limit:
//!
//! ```
//! # use fedfs_io::{ArchiveEntry, MultiplexedOutput};
//! # use fedfs_io::testing::MemArchive;
//! # use std::io::Write;
//! let mux = MultiplexedOutput::new(MemArchive::new());
//! let mut x = mux.output_stream(ArchiveEntry::file("x"), None).unwrap();
//! // `x` holds the target; `y` is transparently buffered to a temp file.
//! let mut y = mux.output_stream(ArchiveEntry::file("y"), None).unwrap();
//! y.write_all(b"second").unwrap();
//! y.close().unwrap();
//! x.write_all(b"first").unwrap();
//! x.close().unwrap(); // drains `y` into the target
//! ```

mod container;
mod counting;
mod entry;
mod error;
mod multiplexed;
pub mod testing;

pub use container::{EntryContainer, InputArchive, OutputArchive};
pub use counting::{CountingRead, CountingWrite};
pub use entry::{ArchiveEntry, EntryKind};
pub use error::{IoError, IoWarning, Result};
pub use multiplexed::{MultiplexedOutput, MuxStream};

/// Recognizable prefix of every temp file created by multiplexing.
pub const TEMP_PREFIX: &str = "fedfs-mux";
