// src/environment.rs

//! Installation prefixes and their activated packages
//!
//! An `Environment` is a read-only snapshot of the builds active in one
//! prefix, taken when it is looked up. Records are borrowed from the
//! `DependencyIndex`; the environment never owns package metadata.

use crate::db::models::{Activation, EnvironmentEntry};
use crate::error::{Error, Result};
use crate::index::{DependencyIndex, RecordSet};
use crate::packages::PackageRecord;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A named installation prefix and its activated package snapshot
#[derive(Debug, Clone)]
pub struct Environment<'a> {
    prefix: PathBuf,
    /// At most one build per package name
    activated: BTreeMap<String, &'a PackageRecord>,
}

impl<'a> Environment<'a> {
    /// Look up the environment registered at `prefix`
    ///
    /// The prefix is made absolute (a leading `~` expands to the home
    /// directory) before lookup.
    pub fn lookup(conn: &Connection, index: &'a DependencyIndex, prefix: &Path) -> Result<Self> {
        let prefix = normalize_prefix(prefix)?;
        let key = prefix.to_string_lossy();

        let entry = EnvironmentEntry::find_by_prefix(conn, &key)?
            .ok_or_else(|| Error::EnvironmentNotFound(prefix.clone()))?;
        let env_id = entry
            .id
            .ok_or_else(|| Error::EnvironmentNotFound(prefix.clone()))?;

        let mut activated = BTreeMap::new();
        for (name, version, build) in Activation::activated_identities(conn, env_id)? {
            let canonical = format!("{}-{}-{}", name, version, build);
            let record = index
                .get(&canonical)
                .ok_or(Error::NotInIndex(canonical))?;
            activated.insert(name, record);
        }

        debug!(
            "Environment {} has {} activated packages",
            prefix.display(),
            activated.len()
        );

        Ok(Self { prefix, activated })
    }

    /// Build an environment snapshot directly from records
    ///
    /// A later record replaces an earlier one with the same name.
    pub fn from_records<I>(prefix: impl Into<PathBuf>, records: I) -> Self
    where
        I: IntoIterator<Item = &'a PackageRecord>,
    {
        Self {
            prefix: prefix.into(),
            activated: records
                .into_iter()
                .map(|record| (record.name.clone(), record))
                .collect(),
        }
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// The build of `name` active in this environment
    pub fn find_activated_package(&self, name: &str) -> Result<&'a PackageRecord> {
        self.activated
            .get(name)
            .copied()
            .ok_or_else(|| Error::PackageNotActivated {
                name: name.to_string(),
                prefix: self.prefix.clone(),
            })
    }

    /// The full activated snapshot
    pub fn activated(&self) -> RecordSet<'a> {
        self.activated.values().copied().collect()
    }
}

/// Register `prefix` as an environment, returning its ID
///
/// Registering an already-known prefix returns the existing ID.
pub fn register(conn: &Connection, prefix: &Path) -> Result<i64> {
    let prefix = normalize_prefix(prefix)?;
    let key = prefix.to_string_lossy().into_owned();

    if let Some(id) = EnvironmentEntry::find_by_prefix(conn, &key)?.and_then(|e| e.id) {
        return Ok(id);
    }

    EnvironmentEntry::new(key).insert(conn)
}

/// Mark `record` as the active build of its name in the environment at `prefix`
pub fn activate(conn: &Connection, prefix: &Path, record: &PackageRecord) -> Result<()> {
    let prefix = normalize_prefix(prefix)?;
    let env_id = EnvironmentEntry::find_by_prefix(conn, &prefix.to_string_lossy())?
        .and_then(|e| e.id)
        .ok_or_else(|| Error::EnvironmentNotFound(prefix.clone()))?;

    let package_id = crate::db::models::PackageEntry::find(
        conn,
        &record.name,
        &record.version,
        &record.build,
    )?
    .and_then(|e| e.id)
    .ok_or_else(|| Error::NotInIndex(record.canonical_name()))?;

    Activation::new(env_id, package_id, record.name.clone()).insert(conn)?;
    Ok(())
}

/// Expand `~` and make `prefix` absolute without touching the filesystem
pub fn normalize_prefix(prefix: &Path) -> Result<PathBuf> {
    let expanded = match prefix.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .ok_or_else(|| Error::IoError("Cannot determine home directory".to_string()))?
            .join(rest),
        Err(_) => prefix.to_path_buf(),
    };

    let absolute = std::path::absolute(&expanded).map_err(|e| {
        Error::IoError(format!(
            "Failed to resolve prefix {}: {}",
            expanded.display(),
            e
        ))
    })?;

    // Drop `.` and `..` so equivalent spellings map to the same environment
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    Ok(normalized)
}
