// src/commands/depends.rs
//! Forward and reverse dependency queries

use super::{format_names, open_db};
use anyhow::Result;
use envpkg::config::Config;
use envpkg::environment::Environment;
use envpkg::index::{DependencyIndex, RecordSet};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Options for `envpkg depends`
pub struct DependsArgs<'a> {
    pub pkg_names: &'a [String],
    pub max_depth: usize,
    pub prefix: Option<&'a Path>,
    pub no_prefix: bool,
    pub reverse: bool,
    pub verbose: bool,
}

/// Show what the named packages depend on, or with `reverse`, what depends on them
pub fn cmd_depends(config: &Config, args: &DependsArgs<'_>) -> Result<()> {
    let conn = open_db(config)?;
    let index = DependencyIndex::load(&conn)?;

    let prefix = args.prefix.unwrap_or(config.default_prefix());
    let env = Environment::lookup(&conn, &index, prefix)?;

    let pkgs = args
        .pkg_names
        .iter()
        .map(|name| env.find_activated_package(name))
        .collect::<envpkg::Result<Vec<_>>>()?;

    let lines = if args.reverse {
        info!("Reverse dependencies of {}", format_names(args.pkg_names));
        let reqs = index.find_compatible_requirements(pkgs.iter().copied())?;
        let mut rdeps = index.get_reverse_deps(&reqs, args.max_depth);

        if !args.no_prefix {
            let activated = env.activated();
            rdeps.retain(|record| activated.contains(record));
        }

        render_reverse(args.pkg_names, &rdeps, args.verbose, args.no_prefix)
    } else {
        info!("Dependencies of {}", format_names(args.pkg_names));
        let deps = index.get_deps(pkgs.iter().copied(), args.max_depth)?;
        render_forward(args.pkg_names, &deps)
    };

    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn render_forward(pkg_names: &[String], deps: &RecordSet<'_>) -> Vec<String> {
    let single = pkg_names.len() == 1;
    let subject = format_names(pkg_names);

    if deps.is_empty() {
        let verb = if single { "does" } else { "do" };
        return vec![format!("{} {} not depend on any packages", subject, verb)];
    }

    let mut names: Vec<String> = deps
        .iter()
        .map(|dep| format!("{} {}", dep.name, dep.version))
        .collect();
    names.sort();
    names.dedup();

    let verb = if single { "depends" } else { "depend" };
    let mut lines = vec![format!("{} {} on the following packages:", subject, verb)];
    lines.extend(names.into_iter().map(|name| format!("    {}", name)));
    lines
}

fn render_reverse(
    pkg_names: &[String],
    rdeps: &RecordSet<'_>,
    verbose: bool,
    no_prefix: bool,
) -> Vec<String> {
    let subject = format_names(pkg_names);

    if rdeps.is_empty() {
        return vec![format!("No packages depend on {}", subject)];
    }

    let activated = if no_prefix { "" } else { "activated " };
    let mut lines = vec![format!(
        "The following {}packages depend on {}:",
        activated, subject
    )];

    if verbose {
        let mut names: Vec<String> = rdeps.iter().map(|r| r.canonical_name()).collect();
        names.sort();
        lines.extend(names.into_iter().map(|name| format!("    {}", name)));
    } else {
        let mut builds: BTreeMap<String, usize> = BTreeMap::new();
        for record in rdeps {
            *builds
                .entry(format!("{} {}", record.name, record.version))
                .or_default() += 1;
        }
        lines.extend(builds.into_iter().map(|(name, count)| {
            if count == 1 {
                format!("    {}", name)
            } else {
                format!("    {} ({} builds)", name, count)
            }
        }));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use envpkg::packages::PackageRecord;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_forward_empty() {
        let deps = RecordSet::new();
        assert_eq!(
            render_forward(&names(&["python"]), &deps),
            vec!["python does not depend on any packages"]
        );
        assert_eq!(
            render_forward(&names(&["python", "zlib"]), &deps),
            vec!["{python, zlib} do not depend on any packages"]
        );
    }

    #[test]
    fn test_forward_lists_name_version() {
        let mkl = PackageRecord::new("mkl", "11.0", "p0");
        let python_a = PackageRecord::new("python", "2.7.3", "5");
        let python_b = PackageRecord::new("python", "2.7.3", "6");
        let deps: RecordSet<'_> = [&python_a, &mkl, &python_b].into_iter().collect();

        assert_eq!(
            render_forward(&names(&["numpy"]), &deps),
            vec![
                "numpy depends on the following packages:",
                "    mkl 11.0",
                "    python 2.7.3",
            ]
        );
        assert_eq!(
            render_forward(&names(&["numpy", "scipy"]), &deps)[0],
            "{numpy, scipy} depend on the following packages:"
        );
    }

    #[test]
    fn test_reverse_empty() {
        assert_eq!(
            render_reverse(&names(&["mkl"]), &RecordSet::new(), false, false),
            vec!["No packages depend on mkl"]
        );
    }

    #[test]
    fn test_reverse_collapses_builds() {
        let a = PackageRecord::new("numpy", "1.7", "py26_0");
        let b = PackageRecord::new("numpy", "1.7", "py27_0");
        let c = PackageRecord::new("scipy", "0.11", "np17py27_0");
        let rdeps: RecordSet<'_> = [&a, &b, &c].into_iter().collect();

        assert_eq!(
            render_reverse(&names(&["mkl"]), &rdeps, false, false),
            vec![
                "The following activated packages depend on mkl:",
                "    numpy 1.7 (2 builds)",
                "    scipy 0.11",
            ]
        );
    }

    #[test]
    fn test_reverse_verbose_no_prefix() {
        let a = PackageRecord::new("numpy", "1.7", "py26_0");
        let b = PackageRecord::new("numpy", "1.7", "py27_0");
        let rdeps: RecordSet<'_> = [&b, &a].into_iter().collect();

        assert_eq!(
            render_reverse(&names(&["mkl", "python"]), &rdeps, true, true),
            vec![
                "The following packages depend on {mkl, python}:",
                "    numpy-1.7-py26_0",
                "    numpy-1.7-py27_0",
            ]
        );
    }
}
