// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn yes_no(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .value_parser(["yes", "no"])
        .default_value("yes")
        .help(help)
}

fn build_cli() -> Command {
    Command::new("envpkg")
        .version(env!("CARGO_PKG_VERSION"))
        .author("envpkg Contributors")
        .about("Dependency queries and package downloads for environments")
        .subcommand_required(true)
        .arg(
            Arg::new("root")
                .long("root")
                .value_name("PATH")
                .global(true)
                .help("Root directory holding the database and package cache (default: ~/.envpkg)"),
        )
        .arg(
            Arg::new("pkgs_dir")
                .long("pkgs-dir")
                .value_name("PATH")
                .global(true)
                .help("Package cache directory (default: <root>/pkgs)"),
        )
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .default_value("1")
                .global(true)
                .help("Maximum concurrent downloads"),
        )
        .subcommand(Command::new("init").about("Initialize the envpkg database and package cache"))
        .subcommand(
            Command::new("import")
                .about("Import a repository index file (JSON) into the package database")
                .arg(Arg::new("file").required(true).help("Path to the index file")),
        )
        .subcommand(
            Command::new("depends")
                .about("Query package dependencies")
                .arg(
                    Arg::new("max_depth")
                        .short('m')
                        .long("max-depth")
                        .default_value("0")
                        .help("Maximum depth to search dependencies, 0 searches all depths"),
                )
                .arg(
                    Arg::new("no_prefix")
                        .long("no-prefix")
                        .action(ArgAction::SetTrue)
                        .help("Return reverse dependencies compatible with any environment, overrides --prefix"),
                )
                .arg(
                    Arg::new("prefix")
                        .short('p')
                        .long("prefix")
                        .help("Return dependencies compatible with a specified environment (default: root)"),
                )
                .arg(
                    Arg::new("reverse")
                        .short('r')
                        .long("reverse")
                        .action(ArgAction::SetTrue)
                        .help("Generate reverse dependencies"),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .action(ArgAction::SetTrue)
                        .help("Display build strings on reverse dependencies"),
                )
                .arg(
                    Arg::new("package_name")
                        .required(true)
                        .num_args(1..)
                        .help("Package name"),
                ),
        )
        .subcommand(
            Command::new("download")
                .about("Download packages and their dependencies")
                .arg(yes_no("confirm", "Ask for confirmation before downloading packages"))
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Display packages to be downloaded, without actually executing"),
                )
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Force package downloads even when the package is already available"),
                )
                .arg(yes_no("progress-bar", "Display progress bar for package downloads"))
                .arg(
                    Arg::new("canonical_name")
                        .required(true)
                        .num_args(1..)
                        .help("Canonical name of package to download and make locally available"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => return,
    };
    let man_dir = out_dir.join("man");
    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("envpkg.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
