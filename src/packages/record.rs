// src/packages/record.rs

use super::Requirement;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Immutable descriptor of one package build
///
/// Identity is `(name, version, build)`; equality, ordering and hashing look
/// at nothing else, so a record compares equal to itself however its
/// archive metadata was filled in.
#[derive(Debug, Clone)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    pub build: String,
    /// Direct dependency specifiers, in declaration order
    pub depends: Vec<Requirement>,
    pub channel: Option<String>,
    pub url: Option<String>,
    pub sha256: Option<String>,
    pub size: u64,
}

impl PackageRecord {
    /// Create a record with no dependencies or archive metadata
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        build: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            build: build.into(),
            depends: Vec::new(),
            channel: None,
            url: None,
            sha256: None,
            size: 0,
        }
    }

    /// Builder-style helper to set the dependency list
    pub fn with_depends(mut self, depends: Vec<Requirement>) -> Self {
        self.depends = depends;
        self
    }

    /// `<name>-<version>-<build>`
    pub fn canonical_name(&self) -> String {
        format!("{}-{}-{}", self.name, self.version, self.build)
    }

    /// File name of this record's archive in a package cache or channel
    pub fn archive_name(&self) -> String {
        format!("{}.tar.bz2", self.canonical_name())
    }

    fn key(&self) -> (&str, &str, &str) {
        (&self.name, &self.version, &self.build)
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.build)
    }
}

impl PartialEq for PackageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for PackageRecord {}

impl Hash for PackageRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for PackageRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_name() {
        let rec = PackageRecord::new("numpy", "1.10", "py27_0");
        assert_eq!(rec.canonical_name(), "numpy-1.10-py27_0");
        assert_eq!(rec.to_string(), "numpy-1.10-py27_0");
        assert_eq!(rec.archive_name(), "numpy-1.10-py27_0.tar.bz2");
    }

    #[test]
    fn test_identity_ignores_metadata() {
        let mut a = PackageRecord::new("mkl", "11.0", "p0");
        let b = PackageRecord::new("mkl", "11.0", "p0");
        a.url = Some("https://example.com/mkl-11.0-p0.tar.bz2".to_string());
        a.size = 1024;
        assert_eq!(a, b);

        let c = PackageRecord::new("mkl", "11.0", "p1");
        assert_ne!(a, c);
        assert!(b < c);
    }
}
