use crate::{AddressError, EntryName, MountPoint, Result, MOUNT_SEPARATOR, SEPARATOR};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A URI denoting an entry, possibly inside a mount point.
///
/// Three forms exist:
///
/// - *opaque*: `zip:file:/a/b.zip!/inner.txt` — a mount point followed by a
///   relative entry name behind the mount-point separator;
/// - *hierarchical absolute*: `file:/a/b` — split into the parent directory
///   mount point `file:/a/` and the final segment `b`;
/// - *relative*: a bare [`EntryName`] without any mount point.
///
/// Rendering a path from its `(mount_point, entry_name)` decomposition
/// reproduces the parsed URI byte for byte (modulo scheme lowercasing).
#[derive(Debug, Clone)]
pub struct FsPath {
    uri: String,
    mount_point: Option<MountPoint>,
    entry_name: EntryName,
}

impl FsPath {
    /// Parse and validate a path literal.
    pub fn parse(literal: &str) -> Result<Self> {
        if literal.contains('?') || literal.contains('#') {
            return Err(AddressError::QueryOrFragment(literal.to_string()));
        }
        let Some((_scheme, rest)) = crate::split_scheme(literal) else {
            // No scheme: a free-standing relative entry name.
            return Ok(Self::relative(EntryName::parse(literal)?));
        };
        if let Some(idx) = literal.rfind(MOUNT_SEPARATOR) {
            // Opaque: everything up to and including the final `!/` is the
            // mount point, the remainder is the entry name.
            let (mount_part, entry_part) = literal.split_at(idx + MOUNT_SEPARATOR.len());
            let mount_point = MountPoint::parse(mount_part)?;
            let entry_name = EntryName::parse(entry_part)?;
            Ok(Self::new(mount_point, entry_name))
        } else {
            // Hierarchical absolute: the parent directory is the mount point,
            // the final segment is the entry name.
            if !rest.starts_with(SEPARATOR) {
                return Err(AddressError::NotAbsolute(literal.to_string()));
            }
            let slash = match literal.rfind(SEPARATOR) {
                Some(slash) => slash,
                None => return Err(AddressError::NotAbsolute(literal.to_string())),
            };
            let (mount_part, entry_part) = literal.split_at(slash + 1);
            let mount_point = MountPoint::parse(mount_part)?;
            let entry_name = EntryName::parse(entry_part)?;
            Ok(Self::new(mount_point, entry_name))
        }
    }

    /// Compose a path from a mount point and an entry name.
    pub fn new(mount_point: MountPoint, entry_name: EntryName) -> Self {
        let uri = format!("{}{}", mount_point, entry_name);
        Self {
            uri,
            mount_point: Some(mount_point),
            entry_name,
        }
    }

    /// A free-standing relative path without a mount point.
    pub fn relative(entry_name: EntryName) -> Self {
        Self {
            uri: entry_name.as_str().to_string(),
            mount_point: None,
            entry_name,
        }
    }

    /// The rendered URI.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The mount point, absent for relative paths.
    pub fn mount_point(&self) -> Option<&MountPoint> {
        self.mount_point.as_ref()
    }

    /// The entry name relative to the mount point.
    pub fn entry_name(&self) -> &EntryName {
        &self.entry_name
    }

    /// True if the path carries a mount point.
    pub fn is_absolute(&self) -> bool {
        self.mount_point.is_some()
    }

    /// Resolve `child` underneath this path's entry name.
    pub fn resolve(&self, child: &EntryName) -> FsPath {
        let entry_name = self.entry_name.resolve(child);
        match &self.mount_point {
            Some(mp) => Self::new(mp.clone(), entry_name),
            None => Self::relative(entry_name),
        }
    }

    /// An equivalent path with every opaque scheme layer peeled away.
    ///
    /// `zip:file:/a/b.zip!/x/y` becomes `file:/a/b.zip/x/y`. Idempotent.
    pub fn hierarchicalize(&self) -> FsPath {
        match &self.mount_point {
            Some(mp) if mp.is_opaque() => mp.hierarchicalize().resolve(&self.entry_name),
            _ => self.clone(),
        }
    }
}

impl PartialEq for FsPath {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for FsPath {}

impl Hash for FsPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl PartialOrd for FsPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FsPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri.cmp(&other.uri)
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl FromStr for FsPath {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
