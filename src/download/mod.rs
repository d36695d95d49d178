// src/download/mod.rs

//! Download planning
//!
//! A `DownloadPlan` lists the records that must be fetched so that every
//! requested package and its full dependency closure is present in the
//! package cache. Records are ordered so that each appears after every
//! record it depends on; ties are broken by canonical name, so identical
//! inputs always produce identical plans.

mod executor;
mod ui;

pub use executor::{ExecuteOptions, TransferSummary, Transport};
pub use ui::{Confirm, NoProgress, ProgressReporter};

use crate::cache::CacheStore;
use crate::error::{Error, Result};
use crate::index::DependencyIndex;
use crate::packages::PackageRecord;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

/// Ordered, deduplicated list of packages to fetch
#[derive(Debug)]
pub struct DownloadPlan<'a> {
    index: &'a DependencyIndex,
    items: Vec<&'a PackageRecord>,
    /// Re-fetch items whose archive is already cached
    force: bool,
}

/// Build the plan for downloading `requested_names` and their dependencies
///
/// Every requested canonical name must exist in the index; otherwise
/// nothing is planned and `UnknownPackage` names the first missing one.
/// Records already in `cache` are left out unless `force` is set, in which
/// case executing the plan fetches them again and replaces the archives.
pub fn create_download_plan<'a, S>(
    index: &'a DependencyIndex,
    cache: &CacheStore,
    requested_names: &[S],
    force: bool,
) -> Result<DownloadPlan<'a>>
where
    S: AsRef<str>,
{
    let requested = requested_names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            index
                .get(name)
                .ok_or_else(|| Error::UnknownPackage(name.to_string()))
        })
        .collect::<Result<BTreeSet<&PackageRecord>>>()?;

    let mut closure = index.get_deps(requested.iter().copied(), 0)?;
    closure.extend(requested.iter().copied());

    let needed: BTreeSet<&PackageRecord> = closure
        .into_iter()
        .filter(|record| force || !cache.is_present(record))
        .collect();

    debug!(
        "{} requested, {} missing from cache (force = {})",
        requested.len(),
        needed.len(),
        force
    );

    let items = dependency_order(index, &needed)?;
    info!("Planned {} package download(s)", items.len());

    Ok(DownloadPlan {
        index,
        items,
        force,
    })
}

/// Order `records` so dependencies come first
///
/// Edges to records outside the set are ignored. Fails with the sorted
/// canonical names of the records on a dependency cycle.
fn dependency_order<'a>(
    index: &'a DependencyIndex,
    records: &BTreeSet<&'a PackageRecord>,
) -> Result<Vec<&'a PackageRecord>> {
    let mut pending: BTreeMap<&'a PackageRecord, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&'a PackageRecord, Vec<&'a PackageRecord>> = BTreeMap::new();

    for &record in records {
        let deps: Vec<&PackageRecord> = index
            .direct_dependencies(record)?
            .into_iter()
            .filter(|dep| records.contains(dep))
            .collect();
        pending.insert(record, deps.len());
        for dep in deps {
            dependents.entry(dep).or_default().push(record);
        }
    }

    let mut ready: BTreeSet<&'a PackageRecord> = pending
        .iter()
        .filter_map(|(&record, &count)| (count == 0).then_some(record))
        .collect();
    let mut ordered = Vec::with_capacity(records.len());

    while let Some(next) = ready.pop_first() {
        ordered.push(next);
        for &child in dependents.get(next).into_iter().flatten() {
            if let Some(count) = pending.get_mut(child) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(child);
                }
            }
        }
    }

    if ordered.len() != records.len() {
        let placed: BTreeSet<&PackageRecord> = ordered.iter().copied().collect();
        let mut stuck: BTreeSet<&PackageRecord> = records
            .iter()
            .copied()
            .filter(|record| !placed.contains(*record))
            .collect();

        // Peel off records that only wait on a cycle without being part of one
        loop {
            let outside = stuck.iter().copied().find(|record| {
                !dependents
                    .get(*record)
                    .into_iter()
                    .flatten()
                    .any(|child| stuck.contains(child))
            });
            match outside {
                Some(record) => {
                    stuck.remove(record);
                }
                None => break,
            }
        }

        return Err(Error::CyclicDependency(
            stuck.iter().map(|record| record.canonical_name()).collect(),
        ));
    }

    Ok(ordered)
}

impl<'a> DownloadPlan<'a> {
    /// True iff there is nothing to fetch
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Records to fetch, dependencies first
    pub fn items(&self) -> &[&'a PackageRecord] {
        &self.items
    }

    /// Total archive size of the plan, where known
    pub fn total_size(&self) -> u64 {
        self.items.iter().map(|record| record.size).sum()
    }
}

impl fmt::Display for DownloadPlan<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.items.iter().map(|r| r.canonical_name()).collect();
        names.sort();

        writeln!(f, "The following packages will be downloaded:")?;
        writeln!(f)?;
        for name in &names {
            writeln!(f, "    {}", name)?;
        }

        let total = self.total_size();
        if total > 0 {
            writeln!(f)?;
            writeln!(f, "Total download size: {}", format_size(total))?;
        }
        Ok(())
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn rec(name: &str, version: &str, build: &str, deps: &[&str]) -> PackageRecord {
        PackageRecord::new(name, version, build)
            .with_depends(deps.iter().map(|d| d.parse().unwrap()).collect())
    }

    fn numpy_index() -> DependencyIndex {
        DependencyIndex::new(vec![
            rec("numpy", "1.10", "py27_0", &["mkl"]),
            rec("mkl", "11.0", "p0", &[]),
        ])
        .unwrap()
    }

    fn names(plan: &DownloadPlan<'_>) -> Vec<String> {
        plan.items().iter().map(|r| r.canonical_name()).collect()
    }

    fn mark_cached(cache: &CacheStore, index: &DependencyIndex, canonical: &str) {
        let record = index.get(canonical).unwrap();
        fs::write(cache.archive_path(record), b"cached").unwrap();
    }

    #[test]
    fn test_plan_skips_cached_dependency() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let index = numpy_index();
        mark_cached(&cache, &index, "mkl-11.0-p0");

        let plan = create_download_plan(&index, &cache, &["numpy-1.10-py27_0"], false).unwrap();
        assert!(!plan.is_empty());
        assert_eq!(names(&plan), vec!["numpy-1.10-py27_0"]);
    }

    #[test]
    fn test_plan_empty_when_everything_cached() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let index = numpy_index();
        mark_cached(&cache, &index, "mkl-11.0-p0");
        mark_cached(&cache, &index, "numpy-1.10-py27_0");

        let plan = create_download_plan(&index, &cache, &["numpy-1.10-py27_0"], false).unwrap();
        assert!(plan.is_empty());

        let forced = create_download_plan(&index, &cache, &["numpy-1.10-py27_0"], true).unwrap();
        assert_eq!(names(&forced), vec!["mkl-11.0-p0", "numpy-1.10-py27_0"]);
    }

    #[test]
    fn test_plan_orders_dependencies_first() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let index = DependencyIndex::new(vec![
            rec("app", "1", "0", &["zlib", "lib"]),
            rec("lib", "1", "0", &["zlib"]),
            rec("zlib", "1", "0", &[]),
            rec("aaa", "1", "0", &[]),
        ])
        .unwrap();

        let plan = create_download_plan(&index, &cache, &["app-1-0", "aaa-1-0"], false).unwrap();
        assert_eq!(names(&plan), vec!["aaa-1-0", "zlib-1-0", "lib-1-0", "app-1-0"]);

        for (pos, record) in plan.items().iter().enumerate() {
            for dep in index.direct_dependencies(record).unwrap() {
                let dep_pos = plan.items().iter().position(|r| *r == dep).unwrap();
                assert!(dep_pos < pos);
            }
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let index = DependencyIndex::new(vec![
            rec("a", "1", "0", &["c", "b"]),
            rec("b", "1", "0", &[]),
            rec("c", "1", "0", &[]),
        ])
        .unwrap();

        let first = create_download_plan(&index, &cache, &["a-1-0"], false).unwrap();
        let second = create_download_plan(&index, &cache, &["a-1-0", "a-1-0"], false).unwrap();
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_unknown_package_aborts() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let index = numpy_index();

        let result = create_download_plan(
            &index,
            &cache,
            &["numpy-1.10-py27_0", "scipy-0.12-np17py27_0"],
            false,
        );
        assert!(matches!(result, Err(Error::UnknownPackage(name)) if name == "scipy-0.12-np17py27_0"));
    }

    #[test]
    fn test_cycle_is_error() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let index = DependencyIndex::new(vec![
            rec("x", "1", "0", &["y"]),
            rec("y", "1", "0", &["x"]),
            rec("leaf", "1", "0", &[]),
            rec("top", "1", "0", &["x", "leaf"]),
        ])
        .unwrap();

        let result = create_download_plan(&index, &cache, &["top-1-0"], false);
        match result {
            Err(Error::CyclicDependency(names)) => {
                assert_eq!(names, vec!["x-1-0", "y-1-0"]);
            }
            other => panic!("expected cycle error, got {:?}", other.map(|p| p.len())),
        }
    }

    #[test]
    fn test_cycle_broken_by_cache() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let index = DependencyIndex::new(vec![
            rec("x", "1", "0", &["y"]),
            rec("y", "1", "0", &["x"]),
        ])
        .unwrap();
        mark_cached(&cache, &index, "y-1-0");

        let plan = create_download_plan(&index, &cache, &["x-1-0"], false).unwrap();
        assert_eq!(names(&plan), vec!["x-1-0"]);
    }

    #[test]
    fn test_display_lists_sorted_names() {
        let dir = TempDir::new().unwrap();
        let cache = CacheStore::open(dir.path()).unwrap();
        let index = numpy_index();

        let plan = create_download_plan(&index, &cache, &["numpy-1.10-py27_0"], false).unwrap();
        let text = plan.to_string();
        assert_eq!(
            text,
            "The following packages will be downloaded:\n\n    mkl-11.0-p0\n    numpy-1.10-py27_0\n"
        );
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
