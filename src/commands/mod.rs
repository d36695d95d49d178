// src/commands/mod.rs
//! Command handlers for the envpkg CLI

mod depends;
mod download;
mod progress;

pub use depends::{DependsArgs, cmd_depends};
pub use download::{DownloadArgs, cmd_download};

use anyhow::{Context, Result};
use envpkg::cache::CacheStore;
use envpkg::config::Config;
use std::path::Path;
use tracing::info;

/// Create the database and cache, and register the root environment
pub fn cmd_init(config: &Config) -> Result<()> {
    let db_path = config.db_path();
    info!("Initializing envpkg database at: {}", db_path.display());

    envpkg::db::init(&db_path.to_string_lossy())?;
    CacheStore::open(&config.pkgs_dir)?;

    let conn = envpkg::db::open(&db_path.to_string_lossy())?;
    envpkg::environment::register(&conn, config.default_prefix())?;

    println!("Database initialized successfully at: {}", db_path.display());
    println!("Package cache: {}", config.pkgs_dir.display());
    Ok(())
}

/// Load a repository index file into the database
pub fn cmd_import(config: &Config, file: &Path) -> Result<()> {
    let mut conn = open_db(config)?;
    let count = envpkg::repository::import_index(&mut conn, file)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    println!("Imported {} package(s) from {}", count, file.display());
    Ok(())
}

fn open_db(config: &Config) -> Result<rusqlite::Connection> {
    let db_path = config.db_path();
    envpkg::db::open(&db_path.to_string_lossy())
        .with_context(|| "Run 'envpkg init' to create the database".to_string())
}

/// `{a, b}` for several names, the bare name for one
fn format_names<S: AsRef<str>>(names: &[S]) -> String {
    let joined = names
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() == 1 {
        joined
    } else {
        format!("{{{}}}", joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(format_names(&["numpy"]), "numpy");
        assert_eq!(format_names(&["numpy", "scipy"]), "{numpy, scipy}");
    }
}
