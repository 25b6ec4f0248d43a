//! Recipe validation and integrity checking
//!
//! This module lints a recipe before it is used for resolution:
//! - Variant references in conditions must name declared variants
//! - Variant defaults must be valid values
//! - Versions must be unique and map to unique archive URLs
//! - Checksums must be well-formed SHA-256 digests
//! - Distinct remote patches sharing a checksum are flagged

use crate::package::Package;
use crate::recipe::{PatchSource, Recipe, VersionSource};
use crate::source::is_sha256_hex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Validation outcome for one package
#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub package: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Check if validation passed (no errors)
    pub fn is_ok(&self) -> bool {
        !self
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::Error(_)))
    }

    /// Check if there are warnings
    pub fn has_warnings(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::Warning(_)))
    }

    /// Get all errors
    pub fn errors(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter_map(|i| match i {
                ValidationIssue::Error(e) => Some(e.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Get all warnings
    pub fn warnings(&self) -> Vec<&str> {
        self.issues
            .iter()
            .filter_map(|i| match i {
                ValidationIssue::Warning(w) => Some(w.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", content = "message", rename_all = "lowercase")]
pub enum ValidationIssue {
    Error(String),
    Warning(String),
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationIssue::Error(e) => write!(f, "error: {}", e),
            ValidationIssue::Warning(w) => write!(f, "warning: {}", w),
        }
    }
}

/// Validate a package: recipe checks plus URL uniqueness
pub fn validate_package<P: Package + ?Sized>(package: &P) -> ValidationResult {
    let recipe = package.recipe();
    let mut issues = validate_recipe(recipe);

    let mut urls: BTreeMap<String, String> = BTreeMap::new();
    for decl in &recipe.versions {
        if matches!(decl.source, VersionSource::Branch(_)) && recipe.git.is_some() {
            continue;
        }
        match package.url_for_version(&decl.version) {
            Ok(url) => {
                if let Some(other) = urls.insert(url.clone(), decl.version.to_string()) {
                    issues.push(ValidationIssue::Error(format!(
                        "Versions {} and {} both map to {}",
                        other, decl.version, url
                    )));
                }
            }
            Err(e) => issues.push(ValidationIssue::Error(format!(
                "No URL for version {}: {}",
                decl.version, e
            ))),
        }
    }

    for issue in &issues {
        if let ValidationIssue::Warning(w) = issue {
            warn!("{}: {}", recipe.name, w);
        }
    }

    ValidationResult {
        package: recipe.name.clone(),
        issues,
    }
}

/// Checks that only need the recipe data
pub fn validate_recipe(recipe: &Recipe) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    issues.extend(validate_variants(recipe));
    issues.extend(validate_versions(recipe));
    issues.extend(validate_patches(recipe));

    issues
}

fn validate_variants(recipe: &Recipe) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = BTreeSet::new();

    for variant in &recipe.variants {
        if !seen.insert(variant.name.as_str()) {
            issues.push(ValidationIssue::Error(format!(
                "Variant '{}' declared more than once",
                variant.name
            )));
        }
        if let Err(e) = variant.coerce(&variant.default) {
            issues.push(ValidationIssue::Error(format!(
                "Invalid default for variant '{}': {}",
                variant.name, e
            )));
        }
    }

    for (label, condition) in recipe.conditions() {
        for name in condition.referenced_variants() {
            if recipe.find_variant(name).is_none() {
                issues.push(ValidationIssue::Error(format!(
                    "{} references undeclared variant '{}'",
                    label, name
                )));
            }
        }
    }

    issues
}

fn validate_versions(recipe: &Recipe) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen = BTreeSet::new();

    for decl in &recipe.versions {
        if !seen.insert(&decl.version) {
            issues.push(ValidationIssue::Error(format!(
                "Version {} declared more than once",
                decl.version
            )));
        }
        match &decl.source {
            VersionSource::Sha256(sha) if !is_sha256_hex(sha) => {
                issues.push(ValidationIssue::Error(format!(
                    "Version {} has a malformed sha256 '{}'",
                    decl.version, sha
                )));
            }
            VersionSource::Branch(branch) if recipe.git.is_none() => {
                issues.push(ValidationIssue::Warning(format!(
                    "Version {} tracks branch '{}' but no git repository is set",
                    decl.version, branch
                )));
            }
            _ => {}
        }
        if !decl.version.is_branch() && matches!(decl.source, VersionSource::Branch(_)) {
            issues.push(ValidationIssue::Warning(format!(
                "Release {} has no checksum",
                decl.version
            )));
        }
    }

    issues
}

fn validate_patches(recipe: &Recipe) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut by_sha: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for patch in &recipe.patches {
        if let PatchSource::Remote { url, sha256 } = &patch.source {
            if !is_sha256_hex(sha256) {
                issues.push(ValidationIssue::Error(format!(
                    "Patch {} has a malformed sha256 '{}'",
                    url, sha256
                )));
                continue;
            }
            by_sha.entry(sha256.as_str()).or_default().push(url.as_str());
        }
    }

    for (sha, urls) in by_sha {
        let distinct: BTreeSet<&str> = urls.iter().copied().collect();
        if distinct.len() > 1 {
            issues.push(ValidationIssue::Warning(format!(
                "Patches {} share sha256 {}; each must be verified against its own checksum",
                urls.join(", "),
                sha
            )));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::Variant;

    fn base() -> Recipe {
        let mut r = Recipe::new("demo", "https://example.org/archive/v01-00.tar.gz");
        r.git = Some("https://example.org/demo.git".to_string());
        r.version("1.0", &"a".repeat(64)).unwrap();
        r.variant(Variant::bool("gui", true, "GUI"));
        r
    }

    #[test]
    fn test_clean_recipe_passes() {
        assert!(validate_recipe(&base()).is_empty());
    }

    #[test]
    fn test_undeclared_variant_reference() {
        let mut r = base();
        r.conflicts("+gui", "+opengl", None).unwrap();
        let issues = validate_recipe(&r);
        assert_eq!(issues.len(), 1);
        assert!(matches!(&issues[0], ValidationIssue::Error(e) if e.contains("opengl")));
    }

    #[test]
    fn test_dependency_variants_are_not_own_variants() {
        let mut r = base();
        r.conflicts("^root ~webgui", "^root@6.28:", None).unwrap();
        assert!(validate_recipe(&r).is_empty());
    }

    #[test]
    fn test_bad_default_and_duplicates() {
        let mut r = base();
        r.variant(Variant::single("cxxstd", "11", &["17", "20"], "standard"));
        r.version("1.0", &"b".repeat(64)).unwrap();
        r.version("2.0", "abc").unwrap();
        let issues = validate_recipe(&r);
        assert_eq!(
            issues
                .iter()
                .filter(|i| matches!(i, ValidationIssue::Error(_)))
                .count(),
            3
        );
    }

    #[test]
    fn test_release_without_checksum_warns() {
        let mut r = base();
        r.branch("2.0", "release-2").unwrap();
        let issues = validate_recipe(&r);
        assert_eq!(
            issues,
            vec![ValidationIssue::Warning("Release 2.0 has no checksum".to_string())]
        );
    }

    #[test]
    fn test_shared_patch_checksum_warns() {
        let mut r = base();
        let sha = "c".repeat(64);
        r.patch_remote("https://example.org/a.patch", &sha, "@:0.9")
            .unwrap();
        r.patch_remote("https://example.org/b.patch", &sha, "").unwrap();
        let issues = validate_recipe(&r);
        assert_eq!(issues.len(), 1);
        assert!(matches!(&issues[0], ValidationIssue::Warning(_)));
    }
}
