//! Declarative package recipe
//!
//! A [`Recipe`] is built once through its declaration methods and is then
//! treated as immutable data by the resolver.

use crate::cmake::Generator;
use crate::condition::{Condition, SpecConstraint};
use crate::types::{DependencyTypes, Version};
use crate::variant::Variant;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a declared version is obtained
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    /// Release archive with a SHA-256 checksum
    Sha256(String),
    /// Git branch
    Branch(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDecl {
    pub version: Version,
    pub source: VersionSource,
}

/// Dependency edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub name: String,
    pub constraint: SpecConstraint,
    pub when: Condition,
    pub types: DependencyTypes,
}

impl std::fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.name, self.constraint)?;
        if !self.when.is_always() {
            write!(f, " when {}", self.when)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PatchSource {
    /// File shipped next to the recipe
    Local { path: PathBuf },
    /// Remote diff with its own checksum
    Remote { url: String, sha256: String },
}

impl std::fmt::Display for PatchSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchSource::Local { path } => write!(f, "{}", path.display()),
            PatchSource::Remote { url, .. } => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub source: PatchSource,
    pub when: Condition,
}

/// A combination that must not occur
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub constraint: Condition,
    pub when: Condition,
    pub message: Option<String>,
}

/// A constraint that must hold whenever `when` does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub constraint: Condition,
    pub when: Condition,
    pub message: Option<String>,
}

/// Package recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub description: String,
    pub homepage: String,
    /// Reference archive URL; other versions are derived from its directory
    pub url: String,
    pub git: Option<String>,
    pub maintainers: Vec<String>,
    pub tags: Vec<String>,
    pub license: String,
    pub generator: Generator,
    pub versions: Vec<VersionDecl>,
    pub variants: Vec<Variant>,
    pub dependencies: Vec<DependencyEdge>,
    pub patches: Vec<Patch>,
    pub conflicts: Vec<Conflict>,
    pub requirements: Vec<Requirement>,
    /// Packages this one extends (e.g. python)
    pub extends: Vec<String>,
}

impl Recipe {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            homepage: String::new(),
            url: url.to_string(),
            git: None,
            maintainers: Vec::new(),
            tags: Vec::new(),
            license: String::new(),
            generator: Generator::default(),
            versions: Vec::new(),
            variants: Vec::new(),
            dependencies: Vec::new(),
            patches: Vec::new(),
            conflicts: Vec::new(),
            requirements: Vec::new(),
            extends: Vec::new(),
        }
    }

    /// Declare a release with its archive checksum
    pub fn version(&mut self, version: &str, sha256: &str) -> Result<&mut Self> {
        self.versions.push(VersionDecl {
            version: Version::parse(version)?,
            source: VersionSource::Sha256(sha256.to_string()),
        });
        Ok(self)
    }

    /// Declare a version tracking a git branch
    pub fn branch(&mut self, version: &str, branch: &str) -> Result<&mut Self> {
        self.versions.push(VersionDecl {
            version: Version::parse(version)?,
            source: VersionSource::Branch(branch.to_string()),
        });
        Ok(self)
    }

    pub fn variant(&mut self, variant: Variant) -> &mut Self {
        self.variants.push(variant);
        self
    }

    /// Declare a dependency such as `root @6.08: +gdml`, active when `when` holds
    pub fn depends_on(
        &mut self,
        spec: &str,
        when: &str,
        types: DependencyTypes,
    ) -> Result<&mut Self> {
        let (name, constraint) = SpecConstraint::parse_named(spec)?;
        self.dependencies.push(DependencyEdge {
            name,
            constraint,
            when: Condition::parse(when)?,
            types,
        });
        Ok(self)
    }

    pub fn patch_local(&mut self, path: &str, when: &str) -> Result<&mut Self> {
        self.patches.push(Patch {
            source: PatchSource::Local {
                path: PathBuf::from(path),
            },
            when: Condition::parse(when)?,
        });
        Ok(self)
    }

    pub fn patch_remote(&mut self, url: &str, sha256: &str, when: &str) -> Result<&mut Self> {
        url::Url::parse(url)?;
        self.patches.push(Patch {
            source: PatchSource::Remote {
                url: url.to_string(),
                sha256: sha256.to_string(),
            },
            when: Condition::parse(when)?,
        });
        Ok(self)
    }

    pub fn conflicts(
        &mut self,
        constraint: &str,
        when: &str,
        message: Option<&str>,
    ) -> Result<&mut Self> {
        self.conflicts.push(Conflict {
            constraint: Condition::parse(constraint)?,
            when: Condition::parse(when)?,
            message: message.map(str::to_string),
        });
        Ok(self)
    }

    pub fn requires(
        &mut self,
        constraint: &str,
        when: &str,
        message: Option<&str>,
    ) -> Result<&mut Self> {
        self.requirements.push(Requirement {
            constraint: Condition::parse(constraint)?,
            when: Condition::parse(when)?,
            message: message.map(str::to_string),
        });
        Ok(self)
    }

    /// Extend another package; adds a build+link+run dependency on it
    pub fn extends(&mut self, package: &str) -> Result<&mut Self> {
        self.extends.push(package.to_string());
        self.depends_on(package, "", DependencyTypes::BUILD_LINK_RUN)
    }

    pub fn find_version(&self, version: &Version) -> Option<&VersionDecl> {
        self.versions.iter().find(|d| &d.version == version)
    }

    /// Look up a declared version or fail with `UnknownVersion`
    pub fn declared_version(&self, version: &Version) -> Result<&VersionDecl> {
        self.find_version(version).ok_or_else(|| Error::UnknownVersion {
            package: self.name.clone(),
            version: version.to_string(),
        })
    }

    pub fn find_variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    /// Declared versions, newest first
    pub fn versions_newest_first(&self) -> Vec<&VersionDecl> {
        let mut versions: Vec<&VersionDecl> = self.versions.iter().collect();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        versions
    }

    /// Every condition in the recipe paired with a label for diagnostics
    pub fn conditions(&self) -> Vec<(String, &Condition)> {
        let mut out = Vec::new();
        for v in &self.variants {
            out.push((format!("variant '{}'", v.name), &v.when));
        }
        for d in &self.dependencies {
            out.push((format!("dependency '{}'", d.name), &d.when));
        }
        for p in &self.patches {
            out.push((format!("patch '{}'", p.source), &p.when));
        }
        for c in &self.conflicts {
            out.push((format!("conflict '{}'", c.constraint), &c.constraint));
            out.push((format!("conflict '{}'", c.constraint), &c.when));
        }
        for r in &self.requirements {
            out.push((format!("requirement '{}'", r.constraint), &r.constraint));
            out.push((format!("requirement '{}'", r.constraint), &r.when));
        }
        out
    }
}
