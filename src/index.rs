// src/index.rs

//! Dependency index and closure queries
//!
//! The index owns every known `PackageRecord` in an arena and keeps the
//! dependency graph as adjacency lists of arena indices. An edge `a -> b`
//! exists when `a` declares a requirement that `b` satisfies; a requirement
//! satisfied by several builds yields one edge per build.
//!
//! Closures are computed breadth-first with a per-record depth map, so
//! cycles between distinct records terminate and every record is reported
//! once, at the shallowest depth it is reached. A `max_depth` of 0 means
//! unbounded; `k > 0` limits traversal to `k` edge hops in either
//! direction.

use crate::db::models;
use crate::error::{Error, Result};
use crate::packages::{PackageRecord, Requirement};
use rusqlite::Connection;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, info};

/// Records returned by a closure query, ordered by identity
pub type RecordSet<'a> = BTreeSet<&'a PackageRecord>;

/// The universe of known package records and their dependency edges
#[derive(Debug, Default)]
pub struct DependencyIndex {
    records: Vec<PackageRecord>,
    by_canonical: HashMap<String, usize>,
    /// Records each record depends on
    forward: Vec<Vec<usize>>,
    /// Records depending on each record
    reverse: Vec<Vec<usize>>,
    /// Every declared requirement and the records declaring it
    declared: BTreeMap<Requirement, Vec<usize>>,
}

impl DependencyIndex {
    /// Build an index from a set of records
    ///
    /// Fails on duplicate canonical names and on records with a requirement
    /// that the record itself satisfies. Depending on another build or
    /// version of the same package name is allowed.
    pub fn new(records: Vec<PackageRecord>) -> Result<Self> {
        let mut by_canonical = HashMap::with_capacity(records.len());
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();

        for (id, record) in records.iter().enumerate() {
            let canonical = record.canonical_name();
            if by_canonical.insert(canonical.clone(), id).is_some() {
                return Err(Error::DuplicateRecord(canonical));
            }
            by_name.entry(record.name.clone()).or_default().push(id);
        }

        let mut forward = vec![Vec::new(); records.len()];
        let mut reverse = vec![Vec::new(); records.len()];
        let mut declared: BTreeMap<Requirement, Vec<usize>> = BTreeMap::new();
        let mut unresolved = 0usize;

        for (id, record) in records.iter().enumerate() {
            for req in &record.depends {
                if req.matches(record) {
                    return Err(Error::SelfDependency(record.canonical_name()));
                }

                declared.entry(req.clone()).or_default().push(id);

                let providers: Vec<usize> = by_name
                    .get(&req.name)
                    .map(|ids| {
                        ids.iter()
                            .copied()
                            .filter(|&p| req.matches(&records[p]))
                            .collect()
                    })
                    .unwrap_or_default();

                if providers.is_empty() {
                    debug!("{}: no record satisfies '{}'", record, req);
                    unresolved += 1;
                }

                for provider in providers {
                    forward[id].push(provider);
                    reverse[provider].push(id);
                }
            }
        }

        for list in forward.iter_mut().chain(reverse.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }
        for list in declared.values_mut() {
            list.dedup();
        }

        let edges: usize = forward.iter().map(Vec::len).sum();
        info!(
            "Built dependency index: {} records, {} edges, {} unresolved specifiers",
            records.len(),
            edges,
            unresolved
        );

        Ok(Self {
            records,
            by_canonical,
            forward,
            reverse,
            declared,
        })
    }

    /// Load the index from the package tables of an envpkg database
    pub fn load(conn: &Connection) -> Result<Self> {
        Self::new(models::load_records(conn)?)
    }

    /// All records, in insertion order
    pub fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    /// Look up a record by canonical name
    pub fn get(&self, canonical_name: &str) -> Option<&PackageRecord> {
        self.by_canonical
            .get(canonical_name)
            .map(|&id| &self.records[id])
    }

    /// Records `record` directly depends on
    pub fn direct_dependencies(&self, record: &PackageRecord) -> Result<Vec<&PackageRecord>> {
        let id = self.id_of(record)?;
        Ok(self.forward[id].iter().map(|&d| &self.records[d]).collect())
    }

    /// Transitive dependency closure of `records`, excluding the inputs
    pub fn get_deps<'a, 'r, I>(&'a self, records: I, max_depth: usize) -> Result<RecordSet<'a>>
    where
        I: IntoIterator<Item = &'r PackageRecord>,
    {
        let start = records
            .into_iter()
            .map(|record| self.id_of(record))
            .collect::<Result<BTreeSet<usize>>>()?;

        let seeds: Vec<(usize, usize)> = start.iter().map(|&id| (id, 0)).collect();
        let reached = breadth_first(&seeds, max_depth, &self.forward);

        Ok(reached
            .into_keys()
            .filter(|id| !start.contains(id))
            .map(|id| &self.records[id])
            .collect())
    }

    /// Declared requirements satisfied by any of `records`
    ///
    /// Only requirements some record in the index actually declares are
    /// returned, so a pinned `numpy 1.7 py27_0` is reported for the
    /// `numpy-1.7-py27_0` record alongside a looser `numpy` when both are
    /// in use.
    pub fn find_compatible_requirements<'r, I>(&self, records: I) -> Result<BTreeSet<Requirement>>
    where
        I: IntoIterator<Item = &'r PackageRecord>,
    {
        let mut found = BTreeSet::new();
        for record in records {
            self.id_of(record)?;
            found.extend(
                self.declared
                    .keys()
                    .filter(|req| req.name == record.name && req.matches(record))
                    .cloned(),
            );
        }
        Ok(found)
    }

    /// Records depending, directly or transitively, on anything satisfying `requirements`
    ///
    /// Depth 1 is the records declaring one of the requirements; each further
    /// level adds the records declaring a requirement satisfied by the level
    /// before.
    pub fn get_reverse_deps<'q, I>(&self, requirements: I, max_depth: usize) -> RecordSet<'_>
    where
        I: IntoIterator<Item = &'q Requirement>,
    {
        let seeds: Vec<(usize, usize)> = requirements
            .into_iter()
            .filter_map(|req| self.declared.get(req))
            .flatten()
            .map(|&id| (id, 1))
            .collect();

        breadth_first(&seeds, max_depth, &self.reverse)
            .into_keys()
            .map(|id| &self.records[id])
            .collect()
    }

    fn id_of(&self, record: &PackageRecord) -> Result<usize> {
        let canonical = record.canonical_name();
        self.by_canonical
            .get(&canonical)
            .copied()
            .ok_or(Error::NotInIndex(canonical))
    }
}

/// Breadth-first walk from `seeds` (each with its starting depth) along `edges`
///
/// Returns the depth at which each reached node was first visited. Nodes at
/// `max_depth` are recorded but not expanded.
fn breadth_first(
    seeds: &[(usize, usize)],
    max_depth: usize,
    edges: &[Vec<usize>],
) -> BTreeMap<usize, usize> {
    let mut depth_of = BTreeMap::new();
    let mut queue = VecDeque::new();

    for &(id, depth) in seeds {
        if max_depth != 0 && depth > max_depth {
            continue;
        }
        if let Entry::Vacant(slot) = depth_of.entry(id) {
            slot.insert(depth);
            queue.push_back((id, depth));
        }
    }

    while let Some((id, depth)) = queue.pop_front() {
        if max_depth != 0 && depth >= max_depth {
            continue;
        }
        for &next in &edges[id] {
            if let Entry::Vacant(slot) = depth_of.entry(next) {
                slot.insert(depth + 1);
                queue.push_back((next, depth + 1));
            }
        }
    }

    depth_of
}
