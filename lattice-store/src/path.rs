//! Paths into the module tree and the state tree.
//!
//! A module's state slice lives at exactly the same path as the module
//! itself, so one type serves both trees. The empty path is the root.

use std::fmt;

use smallvec::SmallVec;

/// An ordered sequence of keys, starting from the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(SmallVec<[String; 4]>);

impl Path {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self(SmallVec::new())
    }

    /// Parse a path written as `"a/b/c"` or `"a.b.c"`.
    ///
    /// Empty segments are skipped, so `""` and `"/"` both parse to the root.
    pub fn parse(raw: &str) -> Self {
        raw.split(['/', '.'])
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
            .collect()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The last segment, i.e. the key of this path under its parent.
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].iter().cloned().collect()))
    }

    /// A new path with `key` appended.
    pub fn child(&self, key: impl Into<String>) -> Path {
        let mut segments = self.0.clone();
        segments.push(key.into());
        Self(segments)
    }

    /// A new path with every segment of `other` appended.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Two paths overlap when one is a prefix of the other.
    ///
    /// A write at one path can change what a read at an overlapping path
    /// observes, and vice versa.
    pub fn overlaps(&self, other: &Path) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl FromIterator<String> for Path {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Self {
        Path::parse(raw)
    }
}

impl From<String> for Path {
    fn from(raw: String) -> Self {
        Path::parse(&raw)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Self(segments.into_iter().collect())
    }
}

impl From<&[&str]> for Path {
    fn from(segments: &[&str]) -> Self {
        segments.iter().map(|s| (*s).to_owned()).collect()
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        segments.iter().map(|s| (*s).to_owned()).collect()
    }
}
