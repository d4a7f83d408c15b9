//! Dot-separated bucket paths.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::str::FromStr;

/// A validated chain of nested bucket names, root first: `"users.active"`.
///
/// Every segment is non-empty and contains no `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketPath {
    text: String,
}

impl BucketPath {
    /// Parses a dot-separated path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidBucketPath`] if the path is empty or has
    /// an empty segment (`"a..b"`, `".a"`, `"a."`).
    pub fn parse(path: &str) -> CoreResult<Self> {
        if path.is_empty() {
            return Err(CoreError::invalid_path(path, "path is empty"));
        }
        if path.split('.').any(str::is_empty) {
            return Err(CoreError::invalid_path(path, "empty segment"));
        }
        Ok(Self {
            text: path.to_string(),
        })
    }

    /// A single-segment path.
    ///
    /// # Errors
    ///
    /// Fails if `name` is empty or contains a `.`.
    pub fn root(name: &str) -> CoreResult<Self> {
        check_segment(name)?;
        Ok(Self {
            text: name.to_string(),
        })
    }

    /// The path as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Iterates the segments, root first.
    pub fn segments(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.text.split('.')
    }

    /// Number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// The last segment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.text.rsplit('.').next().unwrap_or(&self.text)
    }

    /// The enclosing bucket, or `None` for a top-level bucket.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.text.rsplit_once('.').map(|(parent, _)| Self {
            text: parent.to_string(),
        })
    }

    /// The path of a nested bucket called `name`.
    ///
    /// # Errors
    ///
    /// Fails if `name` is empty or contains a `.`.
    pub fn child(&self, name: &str) -> CoreResult<Self> {
        check_segment(name)?;
        Ok(Self {
            text: format!("{}.{name}", self.text),
        })
    }

    /// Whether `self` is `other` or nested somewhere below it.
    #[must_use]
    pub fn starts_with(&self, other: &BucketPath) -> bool {
        self.text == other.text
            || (self.text.starts_with(&other.text)
                && self.text.as_bytes().get(other.text.len()) == Some(&b'.'))
    }
}

fn check_segment(name: &str) -> CoreResult<()> {
    if name.is_empty() {
        Err(CoreError::invalid_path(name, "empty segment"))
    } else if name.contains('.') {
        Err(CoreError::invalid_path(name, "a segment cannot contain '.'"))
    } else {
        Ok(())
    }
}

impl FromStr for BucketPath {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for BucketPath {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for BucketPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
