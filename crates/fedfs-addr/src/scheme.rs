use crate::{AddressError, Result};
use std::fmt;
use std::str::FromStr;

/// A URI scheme token, normalized to ASCII lowercase.
///
/// Schemes follow RFC 3986 syntax: a letter followed by letters, digits,
/// `+`, `-` or `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scheme(String);

impl Scheme {
    /// Parse and validate a scheme token.
    pub fn parse(literal: &str) -> Result<Self> {
        let mut chars = literal.chars();
        let valid = match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
            }
            _ => false,
        };
        if !valid {
            return Err(AddressError::InvalidScheme(literal.to_string()));
        }
        Ok(Self(literal.to_ascii_lowercase()))
    }

    /// The normalized scheme token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Scheme {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
