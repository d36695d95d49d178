// src/commands/download.rs
//! Download packages and their dependencies into the package cache

use super::open_db;
use super::progress::BarProgress;
use anyhow::Result;
use envpkg::cache::CacheStore;
use envpkg::config::Config;
use envpkg::download::{
    Confirm, ExecuteOptions, NoProgress, ProgressReporter, create_download_plan,
};
use envpkg::environment::Environment;
use envpkg::index::DependencyIndex;
use envpkg::packages::PackageRecord;
use envpkg::repository::ChannelClient;
use rusqlite::Connection;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{debug, info};

/// Options for `envpkg download`
pub struct DownloadArgs<'a> {
    pub canonical_names: &'a [String],
    pub confirm: bool,
    pub dry_run: bool,
    pub force: bool,
    pub progress_bar: bool,
}

pub fn cmd_download(config: &Config, args: &DownloadArgs<'_>) -> Result<()> {
    let stdin = io::stdin();
    let mut prompt = PromptConfirm::new(stdin.lock(), io::stdout());
    run_download(config, args, &mut prompt, &mut io::stdout())
}

/// Plan, show, confirm and execute a download
///
/// Everything that can fail before the transfer starts is checked before
/// the plan is shown or the user is asked to proceed.
fn run_download(
    config: &Config,
    args: &DownloadArgs<'_>,
    confirm: &mut dyn Confirm,
    out: &mut dyn Write,
) -> Result<()> {
    let conn = open_db(config)?;
    let index = DependencyIndex::load(&conn)?;
    let cache = CacheStore::open(&config.pkgs_dir)?;
    let env = root_environment(&conn, &index, config.default_prefix())?;

    let plan = create_download_plan(&index, &cache, args.canonical_names, args.force)?;

    if plan.is_empty() {
        writeln!(out, "All packages already downloaded, nothing to do")?;
        return Ok(());
    }

    write!(out, "{}", plan)?;
    out.flush()?;

    if args.dry_run {
        return Ok(());
    }

    if args.confirm && !confirm.confirm() {
        return Ok(());
    }

    let transport = ChannelClient::new()?;
    let options = ExecuteOptions { jobs: config.jobs };

    let bar;
    let progress: &dyn ProgressReporter = if args.progress_bar {
        bar = BarProgress::new();
        &bar
    } else {
        &NoProgress
    };

    let summary = plan.execute(&env, &cache, &transport, progress, options)?;
    info!(
        "Fetched {} package(s), {} already present",
        summary.fetched.len(),
        summary.skipped.len()
    );
    Ok(())
}

/// Downloads are the same for every environment; the root one stands in
fn root_environment<'a>(
    conn: &Connection,
    index: &'a DependencyIndex,
    prefix: &Path,
) -> envpkg::Result<Environment<'a>> {
    match Environment::lookup(conn, index, prefix) {
        Err(envpkg::Error::EnvironmentNotFound(_)) => {
            debug!("Root environment not registered, using an empty snapshot");
            Ok(Environment::from_records(prefix, Vec::<&PackageRecord>::new()))
        }
        other => other,
    }
}

/// Asks `Proceed (y/n)? ` and accepts `y` or `yes` in any case
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self) -> bool {
        if write!(self.output, "Proceed (y/n)? ")
            .and_then(|_| self.output.flush())
            .is_err()
        {
            return false;
        }

        let mut answer = String::new();
        if self.input.read_line(&mut answer).is_err() {
            return false;
        }

        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}
