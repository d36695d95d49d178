// src/db/models.rs

//! Data models for envpkg database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

use crate::error::{Error, Result};
use crate::packages::{PackageRecord, Requirement};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashMap;

/// A package build known to the index
#[derive(Debug, Clone)]
pub struct PackageEntry {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub build: String,
    pub channel: Option<String>,
    pub url: Option<String>,
    pub sha256: Option<String>,
    pub size: i64,
}

impl PackageEntry {
    /// Create a new PackageEntry
    pub fn new(name: String, version: String, build: String) -> Self {
        Self {
            id: None,
            name,
            version,
            build,
            channel: None,
            url: None,
            sha256: None,
            size: 0,
        }
    }

    /// Build an entry carrying the metadata of `record`
    pub fn from_record(record: &PackageRecord) -> Self {
        Self {
            id: None,
            name: record.name.clone(),
            version: record.version.clone(),
            build: record.build.clone(),
            channel: record.channel.clone(),
            url: record.url.clone(),
            sha256: record.sha256.clone(),
            size: record.size as i64,
        }
    }

    /// Insert this package into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO packages (name, version, build, channel, url, sha256, size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &self.name,
                &self.version,
                &self.build,
                &self.channel,
                &self.url,
                &self.sha256,
                &self.size,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a package by its identity
    pub fn find(conn: &Connection, name: &str, version: &str, build: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, build, channel, url, sha256, size
             FROM packages WHERE name = ?1 AND version = ?2 AND build = ?3",
        )?;

        let entry = stmt
            .query_row([name, version, build], Self::from_row)
            .optional()?;

        Ok(entry)
    }

    /// List all packages
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, build, channel, url, sha256, size
             FROM packages ORDER BY name, version, build",
        )?;

        let entries = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Update the archive metadata of this package
    pub fn update(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE packages SET channel = ?1, url = ?2, sha256 = ?3, size = ?4 WHERE id = ?5",
            params![&self.channel, &self.url, &self.sha256, &self.size, &self.id],
        )?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            build: row.get(3)?,
            channel: row.get(4)?,
            url: row.get(5)?,
            sha256: row.get(6)?,
            size: row.get(7)?,
        })
    }
}

/// One dependency specifier of a package, kept in declaration order
#[derive(Debug, Clone)]
pub struct DependencyEntry {
    pub id: Option<i64>,
    pub package_id: i64,
    pub position: i64,
    pub spec: String,
}

impl DependencyEntry {
    /// Create a new DependencyEntry
    pub fn new(package_id: i64, position: i64, spec: String) -> Self {
        Self {
            id: None,
            package_id,
            position,
            spec,
        }
    }

    /// Insert this dependency into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO dependencies (package_id, position, spec) VALUES (?1, ?2, ?3)",
            params![&self.package_id, &self.position, &self.spec],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// List every dependency row, grouped by package in declaration order
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, package_id, position, spec
             FROM dependencies ORDER BY package_id, position",
        )?;

        let deps = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(deps)
    }

    /// Delete all dependencies of a package
    pub fn delete_by_package(conn: &Connection, package_id: i64) -> Result<()> {
        conn.execute("DELETE FROM dependencies WHERE package_id = ?1", [package_id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            package_id: row.get(1)?,
            position: row.get(2)?,
            spec: row.get(3)?,
        })
    }
}

/// Store a package record and its dependency list
///
/// An existing row with the same identity keeps its ID (and therefore its
/// activations) but has its metadata and dependency list replaced.
pub fn store_record(conn: &Connection, record: &PackageRecord) -> Result<i64> {
    let mut entry = PackageEntry::from_record(record);

    let package_id = match PackageEntry::find(conn, &record.name, &record.version, &record.build)?
        .and_then(|existing| existing.id)
    {
        Some(id) => {
            entry.id = Some(id);
            entry.update(conn)?;
            DependencyEntry::delete_by_package(conn, id)?;
            id
        }
        None => entry.insert(conn)?,
    };

    for (position, req) in record.depends.iter().enumerate() {
        DependencyEntry::new(package_id, position as i64, req.to_string()).insert(conn)?;
    }

    Ok(package_id)
}

/// Load every package in the database as a `PackageRecord`
pub fn load_records(conn: &Connection) -> Result<Vec<PackageRecord>> {
    let mut depends: HashMap<i64, Vec<Requirement>> = HashMap::new();
    for dep in DependencyEntry::list_all(conn)? {
        let req = dep.spec.parse::<Requirement>().map_err(|e| {
            Error::ParseError(format!(
                "invalid dependency '{}' on package #{}: {}",
                dep.spec, dep.package_id, e
            ))
        })?;
        depends.entry(dep.package_id).or_default().push(req);
    }

    let records = PackageEntry::list_all(conn)?
        .into_iter()
        .map(|entry| {
            let deps = entry
                .id
                .and_then(|id| depends.remove(&id))
                .unwrap_or_default();
            PackageRecord {
                name: entry.name,
                version: entry.version,
                build: entry.build,
                depends: deps,
                channel: entry.channel,
                url: entry.url,
                sha256: entry.sha256,
                size: entry.size.max(0) as u64,
            }
        })
        .collect();

    Ok(records)
}

/// A registered installation prefix
#[derive(Debug, Clone)]
pub struct EnvironmentEntry {
    pub id: Option<i64>,
    pub prefix: String,
    pub created_at: Option<String>,
}

impl EnvironmentEntry {
    /// Create a new EnvironmentEntry
    pub fn new(prefix: String) -> Self {
        Self {
            id: None,
            prefix,
            created_at: None,
        }
    }

    /// Insert this environment into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO environments (prefix) VALUES (?1)",
            [&self.prefix],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an environment by prefix
    pub fn find_by_prefix(conn: &Connection, prefix: &str) -> Result<Option<Self>> {
        let mut stmt =
            conn.prepare("SELECT id, prefix, created_at FROM environments WHERE prefix = ?1")?;

        let entry = stmt.query_row([prefix], Self::from_row).optional()?;

        Ok(entry)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            prefix: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

/// A package build active in an environment
#[derive(Debug, Clone)]
pub struct Activation {
    pub id: Option<i64>,
    pub environment_id: i64,
    pub package_id: i64,
    pub name: String,
    pub activated_at: Option<String>,
}

impl Activation {
    /// Create a new Activation
    pub fn new(environment_id: i64, package_id: i64, name: String) -> Self {
        Self {
            id: None,
            environment_id,
            package_id,
            name,
            activated_at: None,
        }
    }

    /// Insert this activation, replacing any other build of the same name
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT OR REPLACE INTO activations (environment_id, package_id, name)
             VALUES (?1, ?2, ?3)",
            params![&self.environment_id, &self.package_id, &self.name],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Canonical identities of the builds active in an environment
    pub fn activated_identities(
        conn: &Connection,
        environment_id: i64,
    ) -> Result<Vec<(String, String, String)>> {
        let mut stmt = conn.prepare(
            "SELECT p.name, p.version, p.build
             FROM activations a JOIN packages p ON p.id = a.package_id
             WHERE a.environment_id = ?1
             ORDER BY p.name",
        )?;

        let rows = stmt
            .query_map([environment_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}
