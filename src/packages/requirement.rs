// src/packages/requirement.rs

//! Dependency specifiers
//!
//! A requirement is written `name [version [build]]`, e.g. `python 2.7*`
//! or `mkl 10.3 p0`.

use super::PackageRecord;
use crate::error::{Error, Result};
use crate::version::VersionSpec;
use std::fmt;
use std::str::FromStr;

/// A dependency specifier: package name plus optional version and build constraints
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Requirement {
    pub name: String,
    pub version: Option<VersionSpec>,
    pub build: Option<String>,
}

impl Requirement {
    /// Whether `record` satisfies this requirement
    pub fn matches(&self, record: &PackageRecord) -> bool {
        if record.name != self.name {
            return false;
        }
        if let Some(version) = &self.version
            && !version.matches(&record.version)
        {
            return false;
        }
        match &self.build {
            Some(build) => *build == record.build,
            None => true,
        }
    }
}

impl FromStr for Requirement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| Error::ParseError("empty dependency specifier".to_string()))?;
        let version = parts.next().map(str::parse::<VersionSpec>).transpose()?;
        let build = parts.next().map(str::to_string);

        if parts.next().is_some() {
            return Err(Error::ParseError(format!(
                "too many fields in dependency specifier '{}'",
                s
            )));
        }

        Ok(Self {
            name: name.to_string(),
            version,
            build,
        })
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(version) = &self.version {
            write!(f, " {}", version)?;
        }
        if let Some(build) = &self.build {
            write!(f, " {}", build)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_only() {
        let req: Requirement = "mkl".parse().unwrap();
        assert_eq!(req.name, "mkl");
        assert!(req.version.is_none());
        assert!(req.build.is_none());
        assert_eq!(req.to_string(), "mkl");
    }

    #[test]
    fn test_parse_full() {
        let req: Requirement = "python 2.7* py27_0".parse().unwrap();
        assert_eq!(req.name, "python");
        assert_eq!(req.version.as_ref().unwrap().to_string(), "2.7*");
        assert_eq!(req.build.as_deref(), Some("py27_0"));
        assert_eq!(req.to_string(), "python 2.7* py27_0");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Requirement>().is_err());
        assert!("a 1 b c".parse::<Requirement>().is_err());
    }

    #[test]
    fn test_matches_records() {
        let py273 = PackageRecord::new("python", "2.7.3", "5");
        let py33 = PackageRecord::new("python", "3.3.0", "2");

        let req: Requirement = "python 2.7".parse().unwrap();
        assert!(req.matches(&py273));
        assert!(!req.matches(&py33));

        let pinned: Requirement = "python 2.7.3 4".parse().unwrap();
        assert!(!pinned.matches(&py273));

        let any: Requirement = "python".parse().unwrap();
        assert!(any.matches(&py33));
        let other: Requirement = "numpy".parse().unwrap();
        assert!(!other.matches(&py33));
    }

    #[test]
    fn test_pinned_requirement() {
        let rec = PackageRecord::new("numpy", "1.7", "py27_0");
        let other = PackageRecord::new("numpy", "1.7", "py26_0");
        let req: Requirement = "numpy 1.7 py27_0".parse().unwrap();
        assert!(req.matches(&rec));
        assert!(!req.matches(&other));
    }
}
