// src/repository/mod.rs

//! Repository index import and package transfer
//!
//! This module provides functionality for:
//! - Loading a local repository index (JSON) into the package database
//! - Fetching package archives from a channel with retry support
//! - Verifying archive checksums

mod client;

pub use client::{ChannelClient, resolve_url, verify_checksum};

use crate::db;
use crate::error::{Error, Result};
use crate::index::DependencyIndex;
use crate::packages::{PackageRecord, Requirement};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Repository index format (simple JSON index)
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoryIndex {
    /// Channel URL applied to packages that do not name their own
    #[serde(default)]
    pub channel: Option<String>,
    pub packages: Vec<PackageMetadata>,
}

/// Package metadata in repository index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub build: String,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl PackageMetadata {
    /// Convert to a record, parsing dependency specifiers
    pub fn into_record(self, default_channel: Option<&str>) -> Result<PackageRecord> {
        let canonical = format!("{}-{}-{}", self.name, self.version, self.build);
        let depends = self
            .depends
            .iter()
            .map(|spec| {
                spec.parse::<Requirement>().map_err(|e| {
                    Error::ParseError(format!("{}: invalid dependency '{}': {}", canonical, spec, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PackageRecord {
            name: self.name,
            version: self.version,
            build: self.build,
            depends,
            channel: self.channel.or_else(|| default_channel.map(str::to_string)),
            url: self.url,
            sha256: self.sha256,
            size: self.size,
        })
    }
}

/// Parse a repository index file
pub fn read_index(path: &Path) -> Result<RepositoryIndex> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::ParseError(format!("Invalid repository index {}: {}", path.display(), e)))
}

/// Import every package in the index file at `path` into the database
///
/// All packages are stored in one transaction. A malformed entry, or a
/// resulting package set the dependency index rejects, leaves the database
/// untouched. Returns the number of packages imported.
pub fn import_index(conn: &mut Connection, path: &Path) -> Result<usize> {
    info!("Importing repository index from {}", path.display());

    let index = read_index(path)?;
    let channel = index.channel.as_deref();

    let records = index
        .packages
        .into_iter()
        .map(|meta| meta.into_record(channel))
        .collect::<Result<Vec<_>>>()?;

    let count = db::transaction(conn, |tx| {
        for record in &records {
            debug!("Storing {}", record);
            db::models::store_record(tx, record)?;
        }
        DependencyIndex::new(db::models::load_records(tx)?)?;
        Ok(records.len())
    })?;

    info!("Imported {} package(s)", count);
    Ok(count)
}
