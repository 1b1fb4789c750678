use thiserror::Error;

/// Errors raised while parsing or validating addresses.
///
/// Every variant carries the offending literal so callers see what was
/// rejected, not only why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The scheme token violates URI scheme syntax.
    #[error("invalid scheme in `{0}`")]
    InvalidScheme(String),

    /// An absolute URI was required but the literal is not one.
    #[error("`{0}` is not an absolute URI")]
    NotAbsolute(String),

    /// An entry name was required but the literal has a scheme prefix.
    #[error("`{0}` is not a relative reference")]
    NotRelative(String),

    /// Entry names must not start with a separator.
    #[error("`{0}` starts with a separator")]
    LeadingSeparator(String),

    /// Entry names must not end with a separator.
    #[error("`{0}` ends with a separator")]
    TrailingSeparator(String),

    /// Entry names must be normalized: no empty, `.` or `..` segments.
    #[error("`{0}` contains an empty or dot segment")]
    DotSegment(String),

    /// Addresses never carry a query or fragment part.
    #[error("`{0}` contains a query or fragment")]
    QueryOrFragment(String),

    /// A mount point must end with either `/` or the mount-point separator.
    #[error("`{0}` is missing the mount-point separator")]
    MissingMountSeparator(String),

    /// A hierarchical mount point must not embed a mount-point separator.
    #[error("hierarchical mount point `{0}` embeds a mount-point separator")]
    EmbeddedMountSeparator(String),

    /// The path wrapped by an opaque mount point ends with a separator.
    #[error("path in `{0}` ends with a separator")]
    PathEndsWithSeparator(String),

    /// The path wrapped by an opaque mount point names no entry.
    #[error("mount point `{0}` has an empty entry name")]
    EmptyEntryName(String),
}

/// Result type for address parsing and construction.
pub type Result<T> = std::result::Result<T, AddressError>;
