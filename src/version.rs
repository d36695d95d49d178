// src/version.rs

//! Package version ordering and version constraint matching
//!
//! Versions are compared component by component. Components are split on
//! `.`, `_` and `-`; each component is a leading number followed by an
//! optional text suffix (`1.10.0rc1` -> `1`, `10`, `0rc1`). Missing trailing
//! components count as `0`, so `1.0` and `1.0.0` are equal.
//!
//! Constraints use the `|`/`,` grammar found in package dependency lists:
//!
//! - `1.10*`      - string prefix (glob)
//! - `2.7`        - exact, or a dotted prefix (`2.7` matches `2.7.3`)
//! - `>=1.2,<2`   - conjunction of comparisons
//! - `1.7|1.8`    - alternatives

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Compare two version strings
pub fn compare(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = components(a).collect();
    let right: Vec<&str> = components(b).collect();
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or("0");
        let r = right.get(i).copied().unwrap_or("0");
        match compare_component(l, r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    Ordering::Equal
}

fn components(version: &str) -> impl Iterator<Item = &str> {
    version
        .split(['.', '_', '-'])
        .filter(|component| !component.is_empty())
}

fn split_component(component: &str) -> (Option<u64>, &str) {
    let digits = component
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(component.len());
    let number = component[..digits].parse::<u64>().ok();
    (number, &component[digits..])
}

fn compare_component(a: &str, b: &str) -> Ordering {
    let (a_num, a_suffix) = split_component(a);
    let (b_num, b_suffix) = split_component(b);

    // Purely textual components sort before numbered ones
    let by_number = match (a_num, b_num) {
        (Some(x), Some(y)) => x.cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    if by_number != Ordering::Equal {
        return by_number;
    }

    // A release (no suffix) sorts after its pre-releases
    match (a_suffix.is_empty(), b_suffix.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a_suffix.cmp(b_suffix),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
    Ne,
}

#[derive(Debug, Clone)]
enum Term {
    Compare(Operator, String),
    Glob(String),
    Exact(String),
}

impl Term {
    fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::ParseError("empty version constraint".to_string()));
        }

        const OPERATORS: [(&str, Operator); 6] = [
            (">=", Operator::Ge),
            ("<=", Operator::Le),
            ("==", Operator::Eq),
            ("!=", Operator::Ne),
            (">", Operator::Gt),
            ("<", Operator::Lt),
        ];

        for (token, op) in OPERATORS {
            if let Some(rest) = raw.strip_prefix(token) {
                let rest = rest.trim();
                if rest.is_empty() {
                    return Err(Error::ParseError(format!(
                        "missing version after '{}' in '{}'",
                        token, raw
                    )));
                }
                return Ok(Term::Compare(op, rest.to_string()));
            }
        }

        if let Some(prefix) = raw.strip_suffix('*') {
            return Ok(Term::Glob(prefix.to_string()));
        }

        Ok(Term::Exact(raw.to_string()))
    }

    fn matches(&self, version: &str) -> bool {
        match self {
            Term::Compare(op, target) => {
                let ord = compare(version, target);
                match op {
                    Operator::Ge => ord != Ordering::Less,
                    Operator::Le => ord != Ordering::Greater,
                    Operator::Gt => ord == Ordering::Greater,
                    Operator::Lt => ord == Ordering::Less,
                    Operator::Eq => ord == Ordering::Equal,
                    Operator::Ne => ord != Ordering::Equal,
                }
            }
            Term::Glob(prefix) => version.starts_with(prefix.as_str()),
            Term::Exact(target) => {
                version == target
                    || version
                        .strip_prefix(target.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
            }
        }
    }
}

/// A parsed version constraint
///
/// Equality, ordering and hashing use the constraint text, so two
/// constraints are the same requirement only when spelled the same way.
#[derive(Debug, Clone)]
pub struct VersionSpec {
    raw: String,
    alternatives: Vec<Vec<Term>>,
}

impl VersionSpec {
    /// Whether `version` satisfies this constraint
    pub fn matches(&self, version: &str) -> bool {
        self.alternatives
            .iter()
            .any(|terms| terms.iter().all(|term| term.matches(version)))
    }
}

impl FromStr for VersionSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        let alternatives = raw
            .split('|')
            .map(|alt| alt.split(',').map(Term::parse).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for VersionSpec {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionSpec {}

impl Hash for VersionSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for VersionSpec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionSpec {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}
