//! Run environment modifications and installed library discovery

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const PATH_SEPARATOR: &str = ":";

/// A single environment change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EnvModification {
    Set { name: String, value: String },
    Unset { name: String },
    PrependPath { name: String, path: String },
    AppendPath { name: String, path: String },
}

/// Ordered list of environment changes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentModifications {
    mods: Vec<EnvModification>,
}

impl EnvironmentModifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: impl AsRef<Path>) -> &mut Self {
        self.mods.push(EnvModification::Set {
            name: name.to_string(),
            value: value.as_ref().display().to_string(),
        });
        self
    }

    pub fn unset(&mut self, name: &str) -> &mut Self {
        self.mods.push(EnvModification::Unset {
            name: name.to_string(),
        });
        self
    }

    pub fn prepend_path(&mut self, name: &str, path: impl AsRef<Path>) -> &mut Self {
        self.mods.push(EnvModification::PrependPath {
            name: name.to_string(),
            path: path.as_ref().display().to_string(),
        });
        self
    }

    pub fn append_path(&mut self, name: &str, path: impl AsRef<Path>) -> &mut Self {
        self.mods.push(EnvModification::AppendPath {
            name: name.to_string(),
            path: path.as_ref().display().to_string(),
        });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvModification> {
        self.mods.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.mods.is_empty()
    }

    /// Apply the changes on top of `base`, returning the new environment
    pub fn apply(&self, base: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = base.clone();

        for m in &self.mods {
            match m {
                EnvModification::Set { name, value } => {
                    env.insert(name.clone(), value.clone());
                }
                EnvModification::Unset { name } => {
                    env.remove(name);
                }
                EnvModification::PrependPath { name, path } => {
                    let value = match env.get(name).filter(|v| !v.is_empty()) {
                        Some(existing) => format!("{}{}{}", path, PATH_SEPARATOR, existing),
                        None => path.clone(),
                    };
                    env.insert(name.clone(), value);
                }
                EnvModification::AppendPath { name, path } => {
                    let value = match env.get(name).filter(|v| !v.is_empty()) {
                        Some(existing) => format!("{}{}{}", existing, PATH_SEPARATOR, path),
                        None => path.clone(),
                    };
                    env.insert(name.clone(), value);
                }
            }
        }

        env
    }

    /// Render as POSIX shell commands
    pub fn to_shell(&self) -> String {
        let mut out = String::new();

        for m in &self.mods {
            let line = match m {
                EnvModification::Set { name, value } => {
                    format!("export {}={}", name, shell_quote(value))
                }
                EnvModification::Unset { name } => format!("unset {}", name),
                EnvModification::PrependPath { name, path } => format!(
                    "export {name}={}\"${{{name}:+:${name}}}\"",
                    shell_quote(path),
                    name = name
                ),
                EnvModification::AppendPath { name, path } => format!(
                    "export {name}=\"${{{name}:+${name}:}}\"{}",
                    shell_quote(path),
                    name = name
                ),
            };
            out.push_str(&line);
            out.push('\n');
        }

        out
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Libraries found under an installation prefix
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryList {
    libraries: Vec<PathBuf>,
}

impl LibraryList {
    pub fn libraries(&self) -> &[PathBuf] {
        &self.libraries
    }

    /// Directories containing the libraries, in order of first appearance
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for lib in &self.libraries {
            if let Some(parent) = lib.parent() {
                if !dirs.iter().any(|d| d == parent) {
                    dirs.push(parent.to_path_buf());
                }
            }
        }
        dirs
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }
}

fn is_shared_library(file_name: &str) -> bool {
    file_name.ends_with(".so") || file_name.contains(".so.") || file_name.ends_with(".dylib")
}

fn is_static_library(file_name: &str) -> bool {
    file_name.ends_with(".a")
}

/// Find libraries whose file name starts with `name_prefix` (e.g. `libDD`)
///
/// A missing root yields an empty list. Results are sorted by path.
pub fn find_libraries(
    root: &Path,
    name_prefix: &str,
    shared: bool,
    recursive: bool,
) -> Result<LibraryList> {
    if !root.exists() {
        return Ok(LibraryList::default());
    }

    let walker = WalkDir::new(root)
        .follow_links(true)
        .max_depth(if recursive { usize::MAX } else { 1 });

    let mut libraries = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if !file_name.starts_with(name_prefix) {
            continue;
        }
        let matches = if shared {
            is_shared_library(&file_name)
        } else {
            is_static_library(&file_name)
        };
        if matches {
            libraries.push(entry.path().to_path_buf());
        }
    }

    libraries.sort();
    Ok(LibraryList { libraries })
}
