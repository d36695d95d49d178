// src/download/ui.rs

//! Capabilities the download flow needs from its caller
//!
//! The planning and execution core never talks to a terminal; prompts and
//! progress rendering come in through these traits.

use super::TransferSummary;
use crate::packages::PackageRecord;

/// Progress sink for plan execution
///
/// Methods take `&self` and implementations must be `Sync`, since parallel
/// execution reports from worker threads.
pub trait ProgressReporter: Sync {
    /// Execution is starting with `total` items
    fn begin(&self, _total: usize) {}

    /// `fraction` (0.0 to 1.0) of `item` has been transferred
    fn report_progress(&self, item: &PackageRecord, fraction: f64);

    /// `item` was transferred and is now cached
    fn fetched(&self, _item: &PackageRecord) {}

    /// `item` was already in the cache and was skipped
    fn skipped(&self, _item: &PackageRecord) {}

    /// `item` failed to transfer
    fn failed(&self, _item: &PackageRecord, _error: &str) {}

    /// Execution ended, successfully or not
    fn finish(&self, _summary: &TransferSummary) {}
}

/// Reports nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report_progress(&self, _item: &PackageRecord, _fraction: f64) {}
}

/// Yes/no confirmation before transfers start
pub trait Confirm {
    fn confirm(&mut self) -> bool;
}
