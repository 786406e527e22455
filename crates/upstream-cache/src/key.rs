//! Cache key naming.
//!
//! Keys follow `"<kind>:<entity-id>[:<sub-scope>]"`, for example
//! `standings:2025-11-23` or `roster:TOR:20252026`. Two keys are equal only if
//! their strings are equal; nothing is normalized.

use std::borrow::Borrow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// `<kind>:<entity>`
    pub fn new(kind: &str, entity: impl fmt::Display) -> Self {
        Self(format!("{kind}:{entity}"))
    }

    /// `<kind>:<entity>:<scope>`
    pub fn scoped(kind: &str, entity: impl fmt::Display, scope: impl fmt::Display) -> Self {
        Self(format!("{kind}:{entity}:{scope}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource kind, the part before the first `:`
    pub fn kind(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CacheKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for CacheKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
