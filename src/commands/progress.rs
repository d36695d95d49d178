// src/commands/progress.rs
//! Terminal progress display for package downloads
//!
//! An overall bar counts finished packages; each transfer in flight gets its
//! own bar below it, removed when the transfer ends.

use envpkg::download::{ProgressReporter, TransferSummary};
use envpkg::packages::PackageRecord;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;

const ITEM_SCALE: u64 = 1000;

/// indicatif-backed `ProgressReporter`
pub struct BarProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    items: Mutex<HashMap<String, ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let overall = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{msg} ({pos}/{len}) [{bar:40.green/dim}] {percent}%")
        {
            overall.set_style(style.progress_chars("##-"));
        }
        overall.set_message("Downloading");
        let overall = multi.add(overall);

        Self {
            multi,
            overall,
            items: Mutex::new(HashMap::new()),
        }
    }

    fn item_bar(&self, item: &PackageRecord) -> Option<ProgressBar> {
        let mut items = self.items.lock().ok()?;
        let bar = items.entry(item.canonical_name()).or_insert_with(|| {
            let pb = ProgressBar::new(ITEM_SCALE);
            if let Ok(style) =
                ProgressStyle::default_bar().template("    {msg:30} [{bar:30.blue/dim}] {percent}%")
            {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb.set_message(item.canonical_name());
            self.multi.add(pb)
        });
        Some(bar.clone())
    }

    fn end_item(&self, item: &PackageRecord) {
        let removed = self
            .items
            .lock()
            .ok()
            .and_then(|mut items| items.remove(&item.canonical_name()));
        if let Some(bar) = removed {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        self.overall.inc(1);
    }
}

impl ProgressReporter for BarProgress {
    fn begin(&self, total: usize) {
        self.overall.set_length(total as u64);
    }

    fn report_progress(&self, item: &PackageRecord, fraction: f64) {
        if let Some(bar) = self.item_bar(item) {
            bar.set_position((fraction * ITEM_SCALE as f64) as u64);
        }
    }

    fn fetched(&self, item: &PackageRecord) {
        self.end_item(item);
    }

    fn skipped(&self, item: &PackageRecord) {
        self.end_item(item);
    }

    fn failed(&self, item: &PackageRecord, error: &str) {
        if let Ok(mut items) = self.items.lock()
            && let Some(bar) = items.remove(&item.canonical_name())
        {
            bar.abandon_with_message(format!("{} [FAILED: {}]", item.canonical_name(), error));
        }
    }

    fn finish(&self, summary: &TransferSummary) {
        let message = format!(
            "Downloaded {} package(s), {} already present",
            summary.fetched.len(),
            summary.skipped.len()
        );
        if summary.completed() as u64 == self.overall.length().unwrap_or(0) {
            self.overall.finish_with_message(message);
        } else {
            self.overall.abandon_with_message(message);
        }
    }
}
