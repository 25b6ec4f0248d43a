//! Source locations and archive verification
//!
//! Maps declared versions to upstream archives and verifies fetched files
//! against their declared SHA-256 checksums. Fetching and extraction are left
//! to the host.

use crate::types::Version;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Where the sources for a version come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceLocation {
    /// Release tarball with an integrity hash
    Archive { url: String, sha256: Option<String> },
    /// Git checkout of a branch
    Git { repository: String, branch: String },
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLocation::Archive { url, .. } => write!(f, "{}", url),
            SourceLocation::Git { repository, branch } => write!(f, "{}@{}", repository, branch),
        }
    }
}

/// Strip the file name from a download URL, keeping the directory
pub fn base_url(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)?;
    if parsed.cannot_be_a_base() {
        return Err(Error::InvalidUrl(url.to_string()));
    }
    match url.trim_end_matches('/').rsplit_once('/') {
        Some((base, file)) if !file.is_empty() && base.len() > parsed.scheme().len() + 2 => {
            Ok(base.to_string())
        }
        _ => Err(Error::InvalidUrl(url.to_string())),
    }
}

/// Release file name with dash-separated, two-digit zero-padded fields
///
/// The patch field is omitted when zero: `(1, 12, 0)` gives `v01-12.tar.gz`,
/// `(1, 19, 2)` gives `v01-19-02.tar.gz`. Branches map to `<branch>.tar.gz`.
pub fn dashed_release_name(version: &Version) -> Result<String> {
    let components = match version {
        Version::Branch(name) => return Ok(format!("{}.tar.gz", name)),
        Version::Numeric(c) => c,
    };

    let (major, minor, patch) = match components.as_slice() {
        [major] => (*major, 0, 0),
        [major, minor] => (*major, *minor, 0),
        [major, minor, patch] => (*major, *minor, *patch),
        _ => {
            return Err(Error::InvalidVersion(format!(
                "{} (expected 1 to 3 components, got {})",
                version,
                components.len()
            )))
        }
    };

    if patch == 0 {
        Ok(format!("v{:02}-{:02}.tar.gz", major, minor))
    } else {
        Ok(format!("v{:02}-{:02}-{:02}.tar.gz", major, minor, patch))
    }
}

/// Full archive URL for a version under `base`
pub fn dashed_release_url(base: &str, version: &Version) -> Result<String> {
    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        dashed_release_name(version)?
    ))
}

/// Compute the SHA-256 of a file as lowercase hex
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a fetched file against its declared checksum
pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            path: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    tracing::debug!("Checksum verified: {}", path.display());
    Ok(())
}

/// Whether a string looks like a SHA-256 hex digest
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}
