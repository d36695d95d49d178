// src/download/executor.rs

//! Plan execution
//!
//! Items are fetched through a `Transport` into the `CacheStore`. With one
//! job the plan runs strictly in order. With more, the plan is split into
//! dependency levels (a record's level is one more than the deepest level
//! among its in-plan dependencies) and each level runs on a bounded rayon
//! pool before the next starts.
//!
//! A failure stops execution; items that finished before it stay cached.
//! A forced plan fetches every item, replacing archives already cached.

use super::{DownloadPlan, ProgressReporter};
use crate::cache::{CacheStore, StoreOutcome};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::packages::PackageRecord;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Moves one package archive to a local path
///
/// Timeouts and retries are the transport's business; whatever error it
/// finally returns is reported as a failed transfer.
pub trait Transport: Sync {
    /// Write the archive for `record` to `dest`, calling `progress` with the
    /// fraction transferred so far when it is known
    fn fetch(&self, record: &PackageRecord, dest: &Path, progress: &dyn Fn(f64)) -> Result<()>;
}

/// Execution tuning
#[derive(Debug, Clone, Copy)]
pub struct ExecuteOptions {
    /// Maximum concurrent transfers; 0 and 1 both mean sequential
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

/// What an execution did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSummary {
    /// Canonical names transferred by this run
    pub fetched: Vec<String>,
    /// Canonical names found already cached at fetch time
    pub skipped: Vec<String>,
}

impl TransferSummary {
    /// Items satisfied so far, fetched or skipped
    pub fn completed(&self) -> usize {
        self.fetched.len() + self.skipped.len()
    }

    fn record(&mut self, record: &PackageRecord, outcome: StoreOutcome) {
        match outcome {
            StoreOutcome::Fetched => self.fetched.push(record.canonical_name()),
            StoreOutcome::AlreadyPresent => self.skipped.push(record.canonical_name()),
        }
    }
}

impl<'a> DownloadPlan<'a> {
    /// Fetch every item of the plan into `cache`
    ///
    /// Downloads do not depend on the environment; it is accepted so callers
    /// state which environment the download is on behalf of.
    pub fn execute(
        self,
        environment: &Environment<'_>,
        cache: &CacheStore,
        transport: &dyn Transport,
        progress: &dyn ProgressReporter,
        options: ExecuteOptions,
    ) -> Result<TransferSummary> {
        debug!(
            "Executing download plan of {} item(s) for {}",
            self.items.len(),
            environment.prefix().display()
        );

        let stale = cache.clean_partial()?;
        if stale > 0 {
            info!("Removed {} stale partial download(s)", stale);
        }

        progress.begin(self.items.len());

        let result = if options.jobs <= 1 {
            self.run_sequential(cache, transport, progress)
        } else {
            self.run_parallel(cache, transport, progress, options.jobs)
        };

        let summary = match &result {
            Ok(summary) => summary.clone(),
            Err((summary, _)) => summary.clone(),
        };
        progress.finish(&summary);

        result.map_err(|(_, err)| err)
    }

    fn run_sequential(
        &self,
        cache: &CacheStore,
        transport: &dyn Transport,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<TransferSummary, (TransferSummary, Error)> {
        let mut summary = TransferSummary::default();

        for &record in &self.items {
            match fetch_one(record, self.force, cache, transport, progress) {
                Ok(outcome) => summary.record(record, outcome),
                Err(e) => {
                    let err = transfer_error(record, &summary, e);
                    return Err((summary, err));
                }
            }
        }

        info!(
            "Downloaded {} package(s), {} already present",
            summary.fetched.len(),
            summary.skipped.len()
        );
        Ok(summary)
    }

    fn run_parallel(
        &self,
        cache: &CacheStore,
        transport: &dyn Transport,
        progress: &dyn ProgressReporter,
        jobs: usize,
    ) -> std::result::Result<TransferSummary, (TransferSummary, Error)> {
        let mut summary = TransferSummary::default();

        let pool = match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => pool,
            Err(e) => {
                let err = Error::InitError(format!("Failed to start download workers: {}", e));
                return Err((summary, err));
            }
        };

        let levels = match self.levels() {
            Ok(levels) => levels,
            Err(e) => return Err((summary, e)),
        };

        for (depth, level) in levels {
            debug!("Fetching level {} ({} item(s))", depth, level.len());

            let results: Vec<Result<StoreOutcome>> = pool.install(|| {
                level
                    .par_iter()
                    .map(|&record| fetch_one(record, self.force, cache, transport, progress))
                    .collect()
            });

            let mut first_failure = None;
            for (&record, result) in level.iter().zip(results) {
                match result {
                    Ok(outcome) => summary.record(record, outcome),
                    Err(e) if first_failure.is_none() => first_failure = Some((record, e)),
                    Err(e) => warn!("Additional failure for {}: {}", record, e),
                }
            }

            if let Some((record, e)) = first_failure {
                let err = transfer_error(record, &summary, e);
                return Err((summary, err));
            }
        }

        info!(
            "Downloaded {} package(s), {} already present",
            summary.fetched.len(),
            summary.skipped.len()
        );
        Ok(summary)
    }

    /// Plan items grouped by dependency level, plan order kept within a level
    fn levels(&self) -> Result<BTreeMap<usize, Vec<&'a PackageRecord>>> {
        let mut level_of: HashMap<&PackageRecord, usize> = HashMap::new();
        let mut levels: BTreeMap<usize, Vec<&'a PackageRecord>> = BTreeMap::new();

        for &record in &self.items {
            let level = self
                .index
                .direct_dependencies(record)?
                .into_iter()
                .filter_map(|dep| level_of.get(dep).map(|l| l + 1))
                .max()
                .unwrap_or(0);
            level_of.insert(record, level);
            levels.entry(level).or_default().push(record);
        }

        Ok(levels)
    }
}

fn fetch_one(
    record: &PackageRecord,
    replace: bool,
    cache: &CacheStore,
    transport: &dyn Transport,
    progress: &dyn ProgressReporter,
) -> Result<StoreOutcome> {
    let outcome = cache.store_with(record, replace, |dest| {
        debug!("Fetching {}", record);
        progress.report_progress(record, 0.0);
        transport.fetch(record, dest, &|fraction| {
            progress.report_progress(record, fraction.clamp(0.0, 1.0))
        })?;
        progress.report_progress(record, 1.0);
        Ok(())
    });

    match &outcome {
        Ok(StoreOutcome::AlreadyPresent) => progress.skipped(record),
        Ok(StoreOutcome::Fetched) => progress.fetched(record),
        Err(e) => progress.failed(record, &e.to_string()),
    }

    outcome
}

fn transfer_error(record: &PackageRecord, summary: &TransferSummary, source: Error) -> Error {
    warn!("Download of {} failed: {}", record, source);
    Error::Transfer {
        name: record.canonical_name(),
        completed: summary.completed(),
        source: Box::new(source),
    }
}
