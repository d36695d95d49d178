// tests/integration_test.rs

//! Integration tests for envpkg
//!
//! These tests verify end-to-end functionality across modules.

use envpkg::cache::CacheStore;
use envpkg::download::{ExecuteOptions, NoProgress, Transport, create_download_plan};
use envpkg::environment::{self, Environment};
use envpkg::index::DependencyIndex;
use envpkg::packages::PackageRecord;
use envpkg::repository::{ChannelClient, import_index};
use envpkg::{Error, Result, db};
use std::fs;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

const INDEX: &str = r#"{
    "packages": [
        {"name": "python", "version": "2.7.3", "build": "5"},
        {"name": "mkl", "version": "11.0", "build": "p0"},
        {"name": "numpy", "version": "1.7", "build": "py27_0", "depends": ["python 2.7", "mkl"]},
        {"name": "numpy", "version": "1.7", "build": "py26_0", "depends": ["mkl"]},
        {"name": "scipy", "version": "0.11", "build": "np17py27_0", "depends": ["numpy 1.7 py27_0", "python 2.7"]},
        {"name": "pandas", "version": "0.9", "build": "np17py27_0", "depends": ["scipy"]}
    ]
}"#;

/// Database at `<dir>/envpkg.db` with the sample index imported
fn setup(dir: &Path) -> rusqlite::Connection {
    let db_path = dir.join("envpkg.db").to_string_lossy().into_owned();
    db::init(&db_path).unwrap();
    let mut conn = db::open(&db_path).unwrap();

    let mut index_file = NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut index_file, INDEX.as_bytes()).unwrap();
    assert_eq!(import_index(&mut conn, index_file.path()).unwrap(), 6);

    conn
}

#[test]
fn test_database_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("nested/path/to/envpkg.db")
        .to_string_lossy()
        .into_owned();

    db::init(&db_path).unwrap();
    assert!(Path::new(&db_path).exists());

    let conn = db::open(&db_path).unwrap();
    let result: i32 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
    assert_eq!(result, 1);
}

#[test]
fn test_open_missing_database() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.db");
    let result = db::open(&missing.to_string_lossy());
    assert!(matches!(result, Err(Error::DatabaseNotFound(_))));
}

#[test]
fn test_forward_and_reverse_queries() {
    let dir = TempDir::new().unwrap();
    let conn = setup(dir.path());
    let prefix = dir.path().join("env");

    environment::register(&conn, &prefix).unwrap();
    let index = DependencyIndex::load(&conn).unwrap();
    for canonical in [
        "python-2.7.3-5",
        "mkl-11.0-p0",
        "numpy-1.7-py27_0",
        "scipy-0.11-np17py27_0",
    ] {
        environment::activate(&conn, &prefix, index.get(canonical).unwrap()).unwrap();
    }

    let env = Environment::lookup(&conn, &index, &prefix).unwrap();
    let scipy = env.find_activated_package("scipy").unwrap();

    let names = |set: &envpkg::index::RecordSet<'_>| -> Vec<String> {
        set.iter().map(|r| r.canonical_name()).collect()
    };

    let deps = index.get_deps([scipy], 0).unwrap();
    assert_eq!(
        names(&deps),
        vec!["mkl-11.0-p0", "numpy-1.7-py27_0", "python-2.7.3-5"]
    );
    let direct = index.get_deps([scipy], 1).unwrap();
    assert_eq!(names(&direct), vec!["numpy-1.7-py27_0", "python-2.7.3-5"]);

    let mkl = env.find_activated_package("mkl").unwrap();
    let reqs = index.find_compatible_requirements([mkl]).unwrap();
    let rdeps = index.get_reverse_deps(&reqs, 0);
    assert_eq!(
        names(&rdeps),
        vec![
            "numpy-1.7-py26_0",
            "numpy-1.7-py27_0",
            "pandas-0.9-np17py27_0",
            "scipy-0.11-np17py27_0",
        ]
    );

    // Only what is usable in the environment
    let activated = env.activated();
    let usable: Vec<String> = rdeps
        .iter()
        .filter(|r| activated.contains(*r))
        .map(|r| r.canonical_name())
        .collect();
    assert_eq!(usable, vec!["numpy-1.7-py27_0", "scipy-0.11-np17py27_0"]);

    assert!(matches!(
        env.find_activated_package("pandas"),
        Err(Error::PackageNotActivated { .. })
    ));
}

#[test]
fn test_download_from_local_channel() {
    let dir = TempDir::new().unwrap();
    let conn = setup(dir.path());

    let channel = dir.path().join("channel");
    fs::create_dir_all(&channel).unwrap();
    conn.execute(
        "UPDATE packages SET channel = ?1",
        [format!("file://{}", channel.display())],
    )
    .unwrap();
    for archive in ["mkl-11.0-p0", "numpy-1.7-py26_0"] {
        fs::write(channel.join(format!("{}.tar.bz2", archive)), archive).unwrap();
    }

    let index = DependencyIndex::load(&conn).unwrap();
    let cache = CacheStore::open(dir.path().join("pkgs")).unwrap();
    let env = Environment::from_records(dir.path(), Vec::<&PackageRecord>::new());
    let client = ChannelClient::new().unwrap();

    let plan = create_download_plan(&index, &cache, &["numpy-1.7-py26_0"], false).unwrap();
    assert_eq!(plan.len(), 2);

    let summary = plan
        .execute(&env, &cache, &client, &NoProgress, ExecuteOptions::default())
        .unwrap();
    assert_eq!(summary.fetched, vec!["mkl-11.0-p0", "numpy-1.7-py26_0"]);

    let mkl = index.get("mkl-11.0-p0").unwrap();
    assert_eq!(fs::read_to_string(cache.archive_path(mkl)).unwrap(), "mkl-11.0-p0");

    // Everything cached now
    let again = create_download_plan(&index, &cache, &["numpy-1.7-py26_0"], false).unwrap();
    assert!(again.is_empty());
}

struct FailOn(&'static str);

impl Transport for FailOn {
    fn fetch(&self, record: &PackageRecord, dest: &Path, _progress: &dyn Fn(f64)) -> Result<()> {
        if record.canonical_name() == self.0 {
            return Err(Error::DownloadError("connection reset".to_string()));
        }
        fs::write(dest, record.canonical_name())?;
        Ok(())
    }
}

#[test]
fn test_failed_transfer_keeps_earlier_downloads() {
    let dir = TempDir::new().unwrap();
    let conn = setup(dir.path());
    let index = DependencyIndex::load(&conn).unwrap();
    let cache = CacheStore::open(dir.path().join("pkgs")).unwrap();
    let env = Environment::from_records(dir.path(), Vec::<&PackageRecord>::new());

    // mkl, python, numpy (py27), scipy: fail on the second
    let plan = create_download_plan(&index, &cache, &["scipy-0.11-np17py27_0"], false).unwrap();
    let order: Vec<String> = plan.items().iter().map(|r| r.canonical_name()).collect();
    assert_eq!(
        order,
        vec![
            "mkl-11.0-p0",
            "python-2.7.3-5",
            "numpy-1.7-py27_0",
            "scipy-0.11-np17py27_0",
        ]
    );

    let result = plan.execute(
        &env,
        &cache,
        &FailOn("python-2.7.3-5"),
        &NoProgress,
        ExecuteOptions::default(),
    );
    match result {
        Err(Error::Transfer {
            name, completed, ..
        }) => {
            assert_eq!(name, "python-2.7.3-5");
            assert_eq!(completed, 1);
        }
        other => panic!("expected transfer error, got {:?}", other),
    }

    assert!(cache.is_present(index.get("mkl-11.0-p0").unwrap()));
    assert!(!cache.is_present(index.get("python-2.7.3-5").unwrap()));

    // A retry only plans what is still missing
    let retry = create_download_plan(&index, &cache, &["scipy-0.11-np17py27_0"], false).unwrap();
    assert_eq!(retry.len(), 3);
}
