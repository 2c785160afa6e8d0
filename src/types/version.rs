//! Extension versions and the range constraints used to select extensions by version.
//!
//! Versions are SemVer with an optional leading `v`; missing minor/patch components
//! default to zero. Constraints are lists of comparators. Comparators separated by
//! whitespace or commas must all hold; `||` separates alternatives. Supported forms:
//!
//! ```text
//! 1.2.3  =1.2.3  >1.2  >=1.2.3  <2  <=1.4  ~1.2  ^0.3.1  1.x  *  1.0 - 2.0
//! ```
//!
//! Unlike Cargo requirements, a pre-release version matches any range it falls
//! inside of, ordered by SemVer precedence.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub use semver::Version;
use semver::{BuildMetadata, Comparator, Op};

use crate::error::{Error, Result};

fn invalid_version(text: &str) -> Error {
    Error::bad_request(format!(
        "invalid version '{text}': expected [v]MAJOR[.MINOR[.PATCH[-PRERELEASE][+BUILD]]]"
    ))
}

fn invalid_constraint(source: &str, reason: &str) -> Error {
    Error::bad_request(format!("invalid version constraint '{source}': {reason}"))
}

fn strip_v(text: &str) -> &str {
    text.strip_prefix('v')
        .or_else(|| text.strip_prefix('V'))
        .unwrap_or(text)
}

/// Splits `1.2.3-rc.1+b7` into `1.2.3` and `-rc.1+b7`.
fn split_core(text: &str) -> (&str, &str) {
    match text.find(['-', '+']) {
        Some(at) => text.split_at(at),
        None => (text, ""),
    }
}

/// Parses an extension version, padding `MAJOR` and `MAJOR.MINOR` with zeros.
pub fn parse_version(text: &str) -> Result<Version> {
    let body = strip_v(text.trim());
    let (core, suffix) = split_core(body);
    let given = core.split('.').count();
    let padded = if given < 3 && suffix.is_empty() {
        format!("{core}{}", ".0".repeat(3 - given))
    } else {
        body.to_string()
    };
    Version::parse(&padded).map_err(|_| invalid_version(text))
}

/// SemVer precedence: build metadata is ignored.
fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone)]
struct Bound {
    cmp: Cmp,
    version: Version,
}

impl Bound {
    fn new(cmp: Cmp, version: Version) -> Self {
        Self { cmp, version }
    }

    fn matches(&self, version: &Version) -> bool {
        let ord = precedence(version, &self.version);
        match self.cmp {
            Cmp::Eq => ord == Ordering::Equal,
            Cmp::Gt => ord == Ordering::Greater,
            Cmp::Ge => ord != Ordering::Less,
            Cmp::Lt => ord == Ordering::Less,
            Cmp::Le => ord != Ordering::Greater,
        }
    }
}

const OPERATORS: [&str; 8] = [">=", "<=", "~>", ">", "<", "=", "~", "^"];

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", token)
}

fn tokenize(alternative: &str, source: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut pending: Option<&str> = None;
    for raw in alternative
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
    {
        if let Some(op) = pending.take() {
            tokens.push(format!("{op}{raw}"));
        } else if OPERATORS.contains(&raw) {
            pending = Some(raw);
        } else {
            tokens.push(raw.to_string());
        }
    }
    if pending.is_some() {
        return Err(invalid_constraint(source, "operator without a version"));
    }
    Ok(tokens)
}

/// Parses one comparator. A bare version means `=`, and trailing wildcards are dropped
/// so `1.x` reads as `=1`. Returns `None` for a comparator that matches everything.
fn parse_comparator(op: &str, text: &str, source: &str) -> Result<Option<Comparator>> {
    let not_a_version = || invalid_constraint(source, &format!("'{op}{text}' is not a version"));

    let (core, suffix) = split_core(strip_v(text));
    let mut parts = Vec::new();
    let mut wildcard = false;
    for part in core.split('.') {
        if matches!(part, "x" | "X" | "*") {
            wildcard = true;
        } else if wildcard {
            return Err(not_a_version());
        } else {
            parts.push(part);
        }
    }
    if wildcard && !suffix.is_empty() {
        return Err(not_a_version());
    }
    if parts.is_empty() {
        return match op {
            "" | "=" | ">=" | "<=" | "~" | "~>" | "^" => Ok(None),
            _ => Err(invalid_constraint(source, "wildcard cannot be used with < or >")),
        };
    }

    let op = match op {
        "" => "=",
        "~>" => "~",
        op => op,
    };
    format!("{op}{}{suffix}", parts.join("."))
        .parse::<Comparator>()
        .map(Some)
        .map_err(|_| not_a_version())
}

fn bump(component: u64, source: &str) -> Result<u64> {
    component
        .checked_add(1)
        .ok_or_else(|| invalid_constraint(source, "version component overflow"))
}

/// The lowest version a comparator's prefix denotes.
fn floor(comparator: &Comparator) -> Version {
    Version {
        major: comparator.major,
        minor: comparator.minor.unwrap_or(0),
        patch: comparator.patch.unwrap_or(0),
        pre: comparator.pre.clone(),
        build: BuildMetadata::EMPTY,
    }
}

/// The first version past every version a comparator's prefix denotes.
fn ceiling(comparator: &Comparator, source: &str) -> Result<Version> {
    Ok(match (comparator.minor, comparator.patch) {
        (None, _) => Version::new(bump(comparator.major, source)?, 0, 0),
        (Some(minor), None) => Version::new(comparator.major, bump(minor, source)?, 0),
        (Some(minor), Some(patch)) => Version::new(comparator.major, minor, bump(patch, source)?),
    })
}

fn desugar(comparator: &Comparator, source: &str) -> Result<Vec<Bound>> {
    let c = comparator;
    let exact = c.patch.is_some();
    let bounds = match c.op {
        Op::Exact if exact => vec![Bound::new(Cmp::Eq, floor(c))],
        Op::Exact => vec![
            Bound::new(Cmp::Ge, floor(c)),
            Bound::new(Cmp::Lt, ceiling(c, source)?),
        ],
        Op::Greater if exact => vec![Bound::new(Cmp::Gt, floor(c))],
        Op::Greater => vec![Bound::new(Cmp::Ge, ceiling(c, source)?)],
        Op::GreaterEq => vec![Bound::new(Cmp::Ge, floor(c))],
        Op::Less => vec![Bound::new(Cmp::Lt, floor(c))],
        Op::LessEq if exact => vec![Bound::new(Cmp::Le, floor(c))],
        Op::LessEq => vec![Bound::new(Cmp::Lt, ceiling(c, source)?)],
        Op::Tilde => {
            let upper = match c.minor {
                None => Version::new(bump(c.major, source)?, 0, 0),
                Some(minor) => Version::new(c.major, bump(minor, source)?, 0),
            };
            vec![Bound::new(Cmp::Ge, floor(c)), Bound::new(Cmp::Lt, upper)]
        }
        Op::Caret => {
            let upper = match (c.minor, c.patch) {
                (None, _) => Version::new(bump(c.major, source)?, 0, 0),
                _ if c.major > 0 => Version::new(bump(c.major, source)?, 0, 0),
                (Some(minor), None) => Version::new(0, bump(minor, source)?, 0),
                (Some(minor), Some(_)) if minor > 0 => Version::new(0, bump(minor, source)?, 0),
                (Some(_), Some(patch)) => Version::new(0, 0, bump(patch, source)?),
            };
            vec![Bound::new(Cmp::Ge, floor(c)), Bound::new(Cmp::Lt, upper)]
        }
        _ => return Err(invalid_constraint(source, "unsupported operator")),
    };
    Ok(bounds)
}

/// A parsed version range such as `>=1.0.0 <2.0.0` or `^1.2 || ~0.9`.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    source: String,
    alternatives: Vec<Vec<Bound>>,
}

impl VersionConstraint {
    pub fn parse(text: &str) -> Result<Self> {
        let source = text.trim();
        if source.is_empty() {
            return Err(invalid_constraint(text, "constraint is empty"));
        }

        let mut alternatives = Vec::new();
        for alternative in source.split("||") {
            let tokens = tokenize(alternative, source)?;
            if tokens.is_empty() {
                return Err(invalid_constraint(source, "empty alternative"));
            }

            let mut bounds = Vec::new();
            let mut i = 0;
            while i < tokens.len() {
                let comparators = if i + 2 < tokens.len() && tokens[i + 1] == "-" {
                    let lower = parse_comparator(">=", &tokens[i], source)?;
                    let upper = parse_comparator("<=", &tokens[i + 2], source)?;
                    i += 3;
                    vec![lower, upper]
                } else {
                    let (op, version) = split_operator(&tokens[i]);
                    i += 1;
                    vec![parse_comparator(op, version, source)?]
                };
                for comparator in comparators.iter().flatten() {
                    bounds.extend(desugar(comparator, source)?);
                }
            }
            alternatives.push(bounds);
        }

        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|bounds| bounds.iter().all(|b| b.matches(version)))
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> Version {
        parse_version(text).unwrap()
    }

    fn matches(constraint: &str, version: &str) -> bool {
        VersionConstraint::parse(constraint)
            .unwrap()
            .matches(&v(version))
    }

    #[test]
    fn test_parse_accepts_leading_v_and_partials() {
        assert_eq!(v("v1.2.3"), Version::new(1, 2, 3));
        assert_eq!(v("1.0"), Version::new(1, 0, 0));
        assert_eq!(v("2"), Version::new(2, 0, 0));
        assert_eq!(v("1.2.3-beta.1+build.5").to_string(), "1.2.3-beta.1+build.5");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in ["", "v", "1.2.3.4", "a.b", "1.2-beta", "1..2", "1.2.3-", "1.2.3-be$ta", "1.x"] {
            assert!(parse_version(text).is_err(), "{text}");
        }
    }

    #[test]
    fn test_prerelease_precedence() {
        assert!(v("1.0.0-alpha") < v("1.0.0"));
        assert!(v("1.0.0-alpha") < v("1.0.0-alpha.1"));
        assert!(v("1.0.0-alpha.1") < v("1.0.0-beta"));
        assert!(v("1.0.0-2") < v("1.0.0-10"));
        assert!(v("1.0.0-rc.1") < v("1.0.0"));
        assert_eq!(precedence(&v("1.0.0+a"), &v("1.0.0+b")), Ordering::Equal);
    }

    #[test]
    fn test_build_metadata_does_not_affect_matching() {
        assert!(matches("<=1.0.0", "1.0.0+build.7"));
        assert!(matches("=1.0.0", "1.0.0+build.7"));
    }

    #[test]
    fn test_range_includes_prerelease_within_bounds() {
        let constraint = ">=1.0.0 <2.0.0";
        assert!(!matches(constraint, "v0.9.0"));
        assert!(matches(constraint, "v1.0.0"));
        assert!(matches(constraint, "v1.2.3-beta"));
        assert!(!matches(constraint, "v2.0.0"));
    }

    #[test]
    fn test_comma_and_spaced_operators() {
        assert!(matches(">= 1.0, < 1.5", "1.4.9"));
        assert!(!matches(">= 1.0, < 1.5", "1.5.0"));
        assert!(matches(">=v1.0", "1.0.0"));
    }

    #[test]
    fn test_tilde_and_caret() {
        assert!(matches("~1.2", "1.2.9"));
        assert!(!matches("~1.2", "1.3.0"));
        assert!(matches("~>1.2", "1.2.1"));
        assert!(matches("^1.2.3", "1.9.0"));
        assert!(!matches("^1.2.3", "2.0.0"));
        assert!(matches("^0.2.3", "0.2.9"));
        assert!(!matches("^0.2.3", "0.3.0"));
        assert!(!matches("^0.0.3", "0.0.4"));
    }

    #[test]
    fn test_partial_and_wildcards() {
        assert!(matches("1.x", "1.7.2"));
        assert!(!matches("1.x", "2.0.0"));
        assert!(matches("*", "0.0.1"));
        assert!(matches("1.2", "1.2.5"));
        assert!(matches(">1.2", "1.3.0"));
        assert!(!matches(">1.2", "1.2.9"));
        assert!(matches("<=1.4", "1.4.7"));
    }

    #[test]
    fn test_hyphen_range_and_alternatives() {
        assert!(matches("1.0 - 2.0", "2.0.5"));
        assert!(!matches("1.0 - 2.0", "2.1.0"));
        assert!(matches("<1.0 || >=3.0", "0.5.0"));
        assert!(matches("<1.0 || >=3.0", "3.1.0"));
        assert!(!matches("<1.0 || >=3.0", "2.0.0"));
    }

    #[test]
    fn test_invalid_constraints() {
        for text in ["", ">=", "abc", ">= 1.0 ||", "<*", "1.2.3.4", "1.x.3"] {
            assert!(VersionConstraint::parse(text).is_err(), "{text}");
        }
    }

    #[test]
    fn test_component_overflow_is_rejected() {
        let max = u64::MAX;
        for text in [
            format!("<={max}"),
            format!(">{max}"),
            format!("~{max}"),
            format!("^{max}"),
            format!("1.{max}"),
            format!("^0.0.{max}"),
        ] {
            let err = VersionConstraint::parse(&text).unwrap_err();
            assert!(err.to_string().contains("overflow"), "{text}: {err}");
        }
        assert!(matches(&format!(">={max}"), &format!("{max}.0.0")));
    }
}
