use crate::{
    contains_dot_segment, AddressError, EntryName, FsPath, Result, Scheme, MOUNT_SEPARATOR,
    SEPARATOR,
};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The URI identifying the root of one federated filesystem.
///
/// A mount point is *hierarchical* (an absolute URI whose path ends with the
/// separator, e.g. `file:/home/user/`) or *opaque* (a scheme wrapping an
/// absolute [`FsPath`] plus the literal mount-point separator, e.g.
/// `zip:file:/a/b.zip!/`). Only opaque mount points have a parent: the mount
/// point of the path they wrap.
#[derive(Debug, Clone)]
pub struct MountPoint {
    uri: String,
    scheme: Scheme,
    /// The wrapped path. `Some` exactly for the opaque form.
    path: Option<Box<FsPath>>,
}

impl MountPoint {
    /// Parse and validate a mount point literal.
    pub fn parse(literal: &str) -> Result<Self> {
        if literal.contains('?') || literal.contains('#') {
            return Err(AddressError::QueryOrFragment(literal.to_string()));
        }
        let (scheme_str, rest) = crate::split_scheme(literal)
            .ok_or_else(|| AddressError::NotAbsolute(literal.to_string()))?;
        let scheme = Scheme::parse(scheme_str)?;
        if let Some(stripped) = literal.strip_suffix(MOUNT_SEPARATOR) {
            let inner = &stripped[scheme_str.len() + 1..];
            if inner.ends_with(SEPARATOR) {
                return Err(AddressError::PathEndsWithSeparator(literal.to_string()));
            }
            Self::new_opaque(scheme, FsPath::parse(inner)?)
        } else if rest.ends_with(SEPARATOR) {
            if rest.contains(MOUNT_SEPARATOR) {
                return Err(AddressError::EmbeddedMountSeparator(literal.to_string()));
            }
            if !rest.starts_with(SEPARATOR) {
                return Err(AddressError::NotAbsolute(literal.to_string()));
            }
            if contains_dot_segment(rest) {
                return Err(AddressError::DotSegment(literal.to_string()));
            }
            Ok(Self {
                uri: format!("{}:{}", scheme, rest),
                scheme,
                path: None,
            })
        } else {
            Err(AddressError::MissingMountSeparator(literal.to_string()))
        }
    }

    /// Compose an opaque mount point from a scheme and the path it wraps.
    ///
    /// The path must be absolute and name a non-root entry.
    pub fn new_opaque(scheme: Scheme, path: FsPath) -> Result<Self> {
        if !path.is_absolute() {
            return Err(AddressError::NotAbsolute(path.as_str().to_string()));
        }
        let uri = format!("{}:{}{}", scheme, path, MOUNT_SEPARATOR);
        if path.entry_name().is_root() {
            return Err(AddressError::EmptyEntryName(uri));
        }
        Ok(Self {
            uri,
            scheme,
            path: Some(Box::new(path)),
        })
    }

    /// The rendered URI.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// The outermost scheme.
    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// True for the hierarchical form.
    pub fn is_hierarchical(&self) -> bool {
        self.path.is_none()
    }

    /// True for the opaque form.
    pub fn is_opaque(&self) -> bool {
        self.path.is_some()
    }

    /// The wrapped path, present exactly for the opaque form.
    pub fn path(&self) -> Option<&FsPath> {
        self.path.as_deref()
    }

    /// The mount point this one nests inside, absent for hierarchical forms.
    pub fn parent(&self) -> Option<MountPoint> {
        self.path.as_deref().and_then(|p| p.mount_point().cloned())
    }

    /// Resolve an entry name against this mount point, yielding a path.
    pub fn resolve(&self, name: &EntryName) -> FsPath {
        FsPath::new(self.clone(), name.clone())
    }

    /// An equivalent hierarchical mount point with every opaque scheme layer
    /// peeled away and the separator appended.
    ///
    /// `zip:file:/a/b.zip!/` becomes `file:/a/b.zip/`. Idempotent, but not
    /// injective: differently-schemed wrappers of the same host path collide,
    /// which is exactly what contention detection and sync ordering rely on.
    pub fn hierarchicalize(&self) -> MountPoint {
        let Some(path) = self.path.as_deref() else {
            return self.clone();
        };
        let flat = path.hierarchicalize();
        match flat.mount_point() {
            Some(inner) => Self {
                uri: format!("{}{}", flat, SEPARATOR),
                scheme: inner.scheme().clone(),
                path: None,
            },
            // Opaque mount points always wrap an absolute path.
            None => self.clone(),
        }
    }
}

impl PartialEq for MountPoint {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
    }
}

impl Eq for MountPoint {}

impl Hash for MountPoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uri.hash(state);
    }
}

impl PartialOrd for MountPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MountPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uri.cmp(&other.uri)
    }
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl FromStr for MountPoint {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
