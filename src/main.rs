// src/main.rs

mod commands;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use envpkg::config::Config;
use std::io;
use std::path::PathBuf;

/// Answer for `--confirm` and `--progress-bar`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum YesNo {
    Yes,
    No,
}

impl YesNo {
    fn is_yes(self) -> bool {
        self == YesNo::Yes
    }
}

#[derive(Parser)]
#[command(name = "envpkg")]
#[command(author, version, about = "Dependency queries and package downloads for environments", long_about = None)]
struct Cli {
    /// Root directory holding the database and package cache (default: ~/.envpkg)
    #[arg(long, global = true, env = "ENVPKG_ROOT", value_name = "PATH")]
    root: Option<PathBuf>,

    /// Package cache directory (default: <root>/pkgs)
    #[arg(long, global = true, env = "ENVPKG_PKGS_DIR", value_name = "PATH")]
    pkgs_dir: Option<PathBuf>,

    /// Maximum concurrent downloads
    #[arg(short, long, global = true, env = "ENVPKG_JOBS", default_value_t = 1)]
    jobs: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the envpkg database and package cache
    Init,

    /// Import a repository index file (JSON) into the package database
    Import {
        /// Path to the index file
        file: PathBuf,
    },

    /// Query package dependencies
    Depends {
        /// Maximum depth to search dependencies, 0 searches all depths
        #[arg(short, long, default_value_t = 0)]
        max_depth: usize,

        /// Return reverse dependencies compatible with any environment, overrides --prefix
        #[arg(long)]
        no_prefix: bool,

        /// Return dependencies compatible with a specified environment (default: root)
        #[arg(short, long)]
        prefix: Option<PathBuf>,

        /// Generate reverse dependencies
        #[arg(short, long)]
        reverse: bool,

        /// Display build strings on reverse dependencies
        #[arg(short, long)]
        verbose: bool,

        #[arg(value_name = "package_name", required = true)]
        pkg_names: Vec<String>,
    },

    /// Download packages and their dependencies
    Download {
        /// Ask for confirmation before downloading packages
        #[arg(long, value_enum, default_value_t = YesNo::Yes)]
        confirm: YesNo,

        /// Display packages to be downloaded, without actually executing
        #[arg(long)]
        dry_run: bool,

        /// Force package downloads even when the package is already available
        #[arg(short, long)]
        force: bool,

        /// Display progress bar for package downloads
        #[arg(long, value_enum, default_value_t = YesNo::Yes)]
        progress_bar: YesNo,

        /// Canonical name of package to download and make locally available
        #[arg(value_name = "canonical_name", required = true)]
        canonical_names: Vec<String>,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "envpkg", &mut io::stdout());
        return Ok(());
    }

    let config = Config::resolve(cli.root, cli.pkgs_dir, cli.jobs)?;

    match cli.command {
        Commands::Init => commands::cmd_init(&config),
        Commands::Import { file } => commands::cmd_import(&config, &file),
        Commands::Depends {
            max_depth,
            no_prefix,
            prefix,
            reverse,
            verbose,
            pkg_names,
        } => commands::cmd_depends(
            &config,
            &commands::DependsArgs {
                pkg_names: &pkg_names,
                max_depth,
                prefix: prefix.as_deref(),
                no_prefix,
                reverse,
                verbose,
            },
        ),
        Commands::Download {
            confirm,
            dry_run,
            force,
            progress_bar,
            canonical_names,
        } => commands::cmd_download(
            &config,
            &commands::DownloadArgs {
                canonical_names: &canonical_names,
                confirm: confirm.is_yes(),
                dry_run,
                force,
                progress_bar: progress_bar.is_yes(),
            },
        ),
        Commands::Completions { .. } => Ok(()),
    }
}
