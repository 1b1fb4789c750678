use crate::{split_scheme, AddressError, Result, SEPARATOR};
use std::fmt;
use std::str::FromStr;

/// A normalized relative URI path naming an entry inside one filesystem.
///
/// An entry name never starts or ends with a separator, never contains
/// empty, `.` or `..` segments and never carries a query or fragment.
/// [`EntryName::ROOT`] is the empty name addressing the filesystem root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntryName(String);

impl EntryName {
    /// The empty name, addressing a filesystem's root entry.
    pub const ROOT: EntryName = EntryName(String::new());

    /// Parse and validate an entry name literal.
    pub fn parse(literal: &str) -> Result<Self> {
        if literal.is_empty() {
            return Ok(Self::ROOT);
        }
        if literal.contains('?') || literal.contains('#') {
            return Err(AddressError::QueryOrFragment(literal.to_string()));
        }
        if split_scheme(literal).is_some() {
            return Err(AddressError::NotRelative(literal.to_string()));
        }
        if literal.starts_with(SEPARATOR) {
            return Err(AddressError::LeadingSeparator(literal.to_string()));
        }
        if literal.ends_with(SEPARATOR) {
            return Err(AddressError::TrailingSeparator(literal.to_string()));
        }
        for segment in literal.split(SEPARATOR) {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(AddressError::DotSegment(literal.to_string()));
            }
        }
        Ok(Self(literal.to_string()))
    }

    /// The rendered name. Empty for [`EntryName::ROOT`].
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the root entry name.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Join `child` underneath this name.
    ///
    /// Resolving against the root yields `child`; resolving the root yields
    /// `self` unchanged.
    pub fn resolve(&self, child: &EntryName) -> EntryName {
        if self.is_root() {
            child.clone()
        } else if child.is_root() {
            self.clone()
        } else {
            EntryName(format!("{}{}{}", self.0, SEPARATOR, child.0))
        }
    }

    /// The name with the final segment removed, or `None` for the root.
    pub fn parent(&self) -> Option<EntryName> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(idx) => Some(EntryName(self.0[..idx].to_string())),
            None => Some(Self::ROOT),
        }
    }

    /// The final segment, or the empty string for the root.
    pub fn base_name(&self) -> &str {
        match self.0.rfind(SEPARATOR) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    /// The `/`-separated segments. Empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|seg| !seg.is_empty())
    }
}

impl fmt::Display for EntryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntryName {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
