// src/config.rs

//! Filesystem locations
//!
//! Everything lives under one root directory; the database holds all other
//! state, so there is no config file.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

const DB_FILE: &str = "envpkg.db";
const PKGS_DIR: &str = "pkgs";

/// Resolved locations for one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub root: PathBuf,
    pub pkgs_dir: PathBuf,
    /// Concurrent transfers; 1 means strictly sequential
    pub jobs: usize,
}

impl Config {
    /// Build from optional overrides, falling back to `~/.envpkg`
    pub fn resolve(root: Option<PathBuf>, pkgs_dir: Option<PathBuf>, jobs: usize) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => default_root()?,
        };
        let pkgs_dir = pkgs_dir.unwrap_or_else(|| root.join(PKGS_DIR));

        Ok(Self {
            root,
            pkgs_dir,
            jobs: jobs.max(1),
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE)
    }

    /// Prefix used when a command is not given one: the root environment
    pub fn default_prefix(&self) -> &Path {
        &self.root
    }
}

/// `~/.envpkg`
pub fn default_root() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".envpkg"))
        .ok_or_else(|| Error::InitError("Cannot determine home directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        let config = Config::resolve(Some(PathBuf::from("/srv/envpkg")), None, 4).unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/srv/envpkg/envpkg.db"));
        assert_eq!(config.pkgs_dir, PathBuf::from("/srv/envpkg/pkgs"));
        assert_eq!(config.default_prefix(), Path::new("/srv/envpkg"));
        assert_eq!(config.jobs, 4);
    }

    #[test]
    fn test_pkgs_dir_override() {
        let config = Config::resolve(
            Some(PathBuf::from("/srv/envpkg")),
            Some(PathBuf::from("/var/cache/pkgs")),
            0,
        )
        .unwrap();
        assert_eq!(config.pkgs_dir, PathBuf::from("/var/cache/pkgs"));
        assert_eq!(config.jobs, 1);
    }
}
