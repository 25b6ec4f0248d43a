//! Core type definitions for recipes
//!
//! Versions follow the recipe ecosystem's conventions rather than semver:
//! any number of numeric components, with named branches (`master`) sorting
//! after every numeric release.

use crate::condition;
use crate::variant::VariantSelection;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;

/// A package version: a numeric tuple or a named branch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Version {
    Numeric(Vec<u64>),
    Branch(String),
}

impl Version {
    /// Parse a version string (e.g., "1.32", "6.30.04", "master")
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let first = s
            .chars()
            .next()
            .ok_or_else(|| Error::InvalidVersion("empty version".to_string()))?;

        if first.is_ascii_digit() {
            let components = s
                .split('.')
                .map(|part| {
                    part.parse::<u64>()
                        .map_err(|_| Error::InvalidVersion(format!("{} (bad component '{}')", s, part)))
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Version::Numeric(components));
        }

        if first.is_ascii_alphabetic()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Ok(Version::Branch(s.to_string()));
        }

        Err(Error::InvalidVersion(s.to_string()))
    }

    /// Numeric components, or `None` for a branch
    pub fn components(&self) -> Option<&[u64]> {
        match self {
            Version::Numeric(c) => Some(c),
            Version::Branch(_) => None,
        }
    }

    pub fn is_branch(&self) -> bool {
        matches!(self, Version::Branch(_))
    }

    /// Whether `prefix` is a leading part of this version (1.23.4 starts with 1.23)
    pub fn starts_with(&self, prefix: &Version) -> bool {
        match (self, prefix) {
            (Version::Numeric(v), Version::Numeric(p)) => v.starts_with(p),
            (Version::Branch(a), Version::Branch(b)) => a == b,
            _ => false,
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Version::Numeric(a), Version::Numeric(b)) => a.cmp(b),
            (Version::Numeric(_), Version::Branch(_)) => Ordering::Less,
            (Version::Branch(_), Version::Numeric(_)) => Ordering::Greater,
            (Version::Branch(a), Version::Branch(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::Numeric(c) => {
                let parts: Vec<String> = c.iter().map(|n| n.to_string()).collect();
                write!(f, "{}", parts.join("."))
            }
            Version::Branch(name) => write!(f, "{}", name),
        }
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Version::parse(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}

/// An inclusive version range (`1.19:1.23`, `1.26:`, `:1.17`, `1.32`)
///
/// Upper bounds match by prefix, so `:1.23` contains `1.23.4`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionRange {
    pub lo: Option<Version>,
    pub hi: Option<Version>,
}

impl VersionRange {
    /// The range containing every version
    pub fn any() -> Self {
        Self::default()
    }

    /// Range matching a single version and everything it prefixes
    pub fn exact(version: Version) -> Self {
        Self {
            lo: Some(version.clone()),
            hi: Some(version),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::any());
        }

        let bound = |part: &str| -> Result<Option<Version>> {
            if part.is_empty() {
                Ok(None)
            } else {
                Version::parse(part)
                    .map(Some)
                    .map_err(|_| Error::InvalidVersionRange(s.to_string()))
            }
        };

        let range = match s.split_once(':') {
            Some((lo, hi)) => {
                if hi.contains(':') {
                    return Err(Error::InvalidVersionRange(s.to_string()));
                }
                Self {
                    lo: bound(lo)?,
                    hi: bound(hi)?,
                }
            }
            None => Self::exact(
                Version::parse(s).map_err(|_| Error::InvalidVersionRange(s.to_string()))?,
            ),
        };

        if let Some(lo) = &range.lo {
            if range.hi.is_some() && !range.contains(lo) {
                return Err(Error::InvalidVersionRange(format!(
                    "{} (lower bound above upper bound)",
                    s
                )));
            }
        }

        Ok(range)
    }

    pub fn is_any(&self) -> bool {
        self.lo.is_none() && self.hi.is_none()
    }

    pub fn contains(&self, version: &Version) -> bool {
        let lo_ok = self.lo.as_ref().map(|lo| version >= lo).unwrap_or(true);
        let hi_ok = self
            .hi
            .as_ref()
            .map(|hi| version <= hi || version.starts_with(hi))
            .unwrap_or(true);
        lo_ok && hi_ok
    }
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.lo, &self.hi) {
            (Some(lo), Some(hi)) if lo == hi => write!(f, "{}", lo),
            (lo, hi) => {
                if let Some(lo) = lo {
                    write!(f, "{}", lo)?;
                }
                write!(f, ":")?;
                if let Some(hi) = hi {
                    write!(f, "{}", hi)?;
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<String> for VersionRange {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        VersionRange::parse(&s)
    }
}

impl From<VersionRange> for String {
    fn from(r: VersionRange) -> Self {
        if r.is_any() {
            String::new()
        } else {
            r.to_string()
        }
    }
}

/// Value of a variant: boolean toggle or a single enumerated choice
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Single(String),
}

impl VariantValue {
    /// Interpret the value as a boolean, accepting textual spellings
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariantValue::Bool(b) => Some(*b),
            VariantValue::Single(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" => Some(true),
                "false" | "off" | "no" => Some(false),
                _ => None,
            },
        }
    }

    /// Whether this value satisfies an expected value from a condition
    pub fn matches(&self, expected: &VariantValue) -> bool {
        match (self, expected) {
            (VariantValue::Single(a), VariantValue::Single(b)) => a == b,
            _ => match (self.as_bool(), expected.as_bool()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl std::fmt::Display for VariantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariantValue::Bool(b) => write!(f, "{}", b),
            VariantValue::Single(s) => write!(f, "{}", s),
        }
    }
}

/// How a dependency is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTypes {
    pub build: bool,
    pub link: bool,
    pub run: bool,
    pub test: bool,
}

impl DependencyTypes {
    pub const BUILD: Self = Self {
        build: true,
        link: false,
        run: false,
        test: false,
    };

    pub const BUILD_TEST: Self = Self {
        build: true,
        link: false,
        run: false,
        test: true,
    };

    /// Build and link, the default for library dependencies
    pub const DEFAULT: Self = Self {
        build: true,
        link: true,
        run: false,
        test: false,
    };

    pub const BUILD_LINK_RUN: Self = Self {
        build: true,
        link: true,
        run: true,
        test: false,
    };

    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.build {
            names.push("build");
        }
        if self.link {
            names.push("link");
        }
        if self.run {
            names.push("run");
        }
        if self.test {
            names.push("test");
        }
        names
    }
}

impl Default for DependencyTypes {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for DependencyTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.names().join(","))
    }
}

/// Concrete state of a dependency as chosen by the host solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyState {
    pub version: Version,
    #[serde(default)]
    pub variants: VariantSelection,
    #[serde(default)]
    pub prefix: Option<PathBuf>,
}

impl DependencyState {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            variants: VariantSelection::default(),
            prefix: None,
        }
    }

    /// Parse `name@version +a ~b key=value` into a name and state
    pub fn parse(s: &str) -> Result<(String, Self)> {
        let node = condition::parse_concrete(s)?;
        Ok((
            node.name,
            Self {
                version: node.version,
                variants: node.variants,
                prefix: None,
            },
        ))
    }

    pub fn with_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_variant(mut self, name: &str, value: VariantValue) -> Self {
        self.variants.set(name, value);
        self
    }
}

impl std::fmt::Display for DependencyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.version)?;
        if !self.variants.is_empty() {
            write!(f, " {}", self.variants)?;
        }
        Ok(())
    }
}

/// Compiler used for the build (e.g., `gcc@13.2.0`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CompilerSpec {
    pub name: String,
    pub version: Version,
}

impl CompilerSpec {
    pub fn parse(s: &str) -> Result<Self> {
        let node = condition::parse_concrete(s)?;
        if !node.variants.is_empty() {
            return Err(Error::ConditionParse {
                input: s.to_string(),
                reason: "compilers do not take variants".to_string(),
            });
        }
        Ok(Self {
            name: node.name,
            version: node.version,
        })
    }
}

impl std::fmt::Display for CompilerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl TryFrom<String> for CompilerSpec {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        CompilerSpec::parse(&s)
    }
}

impl From<CompilerSpec> for String {
    fn from(c: CompilerSpec) -> Self {
        c.to_string()
    }
}
