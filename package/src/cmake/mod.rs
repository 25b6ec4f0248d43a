//! CMake configuration arguments
//!
//! Translates variant values into `-D` defines and assembles the configure
//! command line handed to CMake.

use crate::types::VariantValue;
use crate::variant::ResolvedVariants;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Value of a CMake cache entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefineValue {
    Bool(bool),
    String(String),
}

impl DefineValue {
    /// CMake cache type
    pub fn cache_type(&self) -> &'static str {
        match self {
            DefineValue::Bool(_) => "BOOL",
            DefineValue::String(_) => "STRING",
        }
    }
}

impl std::fmt::Display for DefineValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefineValue::Bool(true) => write!(f, "ON"),
            DefineValue::Bool(false) => write!(f, "OFF"),
            DefineValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for DefineValue {
    fn from(b: bool) -> Self {
        DefineValue::Bool(b)
    }
}

impl From<&str> for DefineValue {
    fn from(s: &str) -> Self {
        DefineValue::String(s.to_string())
    }
}

impl From<String> for DefineValue {
    fn from(s: String) -> Self {
        DefineValue::String(s)
    }
}

impl From<&Path> for DefineValue {
    fn from(p: &Path) -> Self {
        DefineValue::String(p.display().to_string())
    }
}

impl From<&VariantValue> for DefineValue {
    fn from(v: &VariantValue) -> Self {
        match v {
            VariantValue::Bool(b) => DefineValue::Bool(*b),
            VariantValue::Single(s) => DefineValue::String(s.clone()),
        }
    }
}

/// A single `-DKEY:TYPE=VALUE` define
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CMakeDefine {
    pub key: String,
    pub value: DefineValue,
}

impl CMakeDefine {
    pub fn new(key: &str, value: impl Into<DefineValue>) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
        }
    }

    pub fn to_arg(&self) -> String {
        format!("-D{}:{}={}", self.key, self.value.cache_type(), self.value)
    }
}

impl std::fmt::Display for CMakeDefine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_arg())
    }
}

/// Ordered list of defines for a configure run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CMakeArgs {
    defines: Vec<CMakeDefine>,
}

impl CMakeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a define with an explicit value
    pub fn define(&mut self, key: &str, value: impl Into<DefineValue>) -> &mut Self {
        self.defines.push(CMakeDefine::new(key, value));
        self
    }

    /// Add a define mirroring a variant's value
    ///
    /// Inactive variants produce no define.
    pub fn define_from_variant(
        &mut self,
        key: &str,
        variant: &str,
        variants: &ResolvedVariants,
    ) -> Result<&mut Self> {
        if let Some(value) = variants.lookup(variant)? {
            self.defines.push(CMakeDefine::new(key, value));
        }
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&DefineValue> {
        self.defines.iter().find(|d| d.key == key).map(|d| &d.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CMakeDefine> {
        self.defines.iter()
    }

    pub fn len(&self) -> usize {
        self.defines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    pub fn into_defines(self) -> Vec<CMakeDefine> {
        self.defines
    }

    /// Render as command line arguments
    pub fn to_args(&self) -> Vec<String> {
        self.defines.iter().map(|d| d.to_arg()).collect()
    }
}

/// CMake generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Generator {
    #[default]
    Ninja,
    UnixMakefiles,
}

impl Generator {
    /// Name passed to `cmake -G`
    pub fn cmake_name(&self) -> &'static str {
        match self {
            Generator::Ninja => "Ninja",
            Generator::UnixMakefiles => "Unix Makefiles",
        }
    }

    /// Program that drives the generated build
    pub fn build_program(&self) -> &'static str {
        match self {
            Generator::Ninja => "ninja",
            Generator::UnixMakefiles => "make",
        }
    }
}

/// Full configure command line: standard arguments followed by recipe defines
pub fn configure_args(
    source_dir: &Path,
    prefix: &Path,
    build_type: &str,
    generator: Generator,
    defines: &[CMakeDefine],
) -> Vec<String> {
    let mut args = vec![
        source_dir.display().to_string(),
        "-G".to_string(),
        generator.cmake_name().to_string(),
        CMakeDefine::new("CMAKE_INSTALL_PREFIX", prefix).to_arg(),
        CMakeDefine::new("CMAKE_BUILD_TYPE", build_type).to_arg(),
    ];
    args.extend(defines.iter().map(|d| d.to_arg()));
    args
}
