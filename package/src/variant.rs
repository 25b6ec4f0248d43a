//! Variant declarations and resolution
//!
//! A variant is a named build option with a default. Boolean variants toggle
//! features; single-valued variants pick one value from a fixed set. A variant
//! may carry a `when` condition, in which case it only exists for matching
//! selections.

use crate::condition::{self, Condition, EvalContext};
use crate::types::{CompilerSpec, DependencyState, Version, VariantValue};
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Kind of values a variant accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariantKind {
    Bool,
    Single { values: Vec<String> },
}

/// Variant declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub description: String,
    pub default: VariantValue,
    pub kind: VariantKind,
    pub when: Condition,
}

impl Variant {
    /// Declare a boolean variant
    pub fn bool(name: &str, default: bool, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            default: VariantValue::Bool(default),
            kind: VariantKind::Bool,
            when: Condition::Always,
        }
    }

    /// Declare a single-valued variant
    pub fn single(name: &str, default: &str, values: &[&str], description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            default: VariantValue::Single(default.to_string()),
            kind: VariantKind::Single {
                values: values.iter().map(|v| v.to_string()).collect(),
            },
            when: Condition::Always,
        }
    }

    /// Restrict the variant to selections matching `when`
    pub fn when(mut self, when: &str) -> Result<Self> {
        self.when = Condition::parse(when)?;
        Ok(self)
    }

    pub fn is_conditional(&self) -> bool {
        !self.when.is_always()
    }

    /// Check a value against this variant, normalising boolean spellings
    pub fn coerce(&self, value: &VariantValue) -> Result<VariantValue> {
        let invalid = |reason: String| Error::InvalidVariantValue {
            variant: self.name.clone(),
            value: value.to_string(),
            reason,
        };

        match &self.kind {
            VariantKind::Bool => value
                .as_bool()
                .map(VariantValue::Bool)
                .ok_or_else(|| invalid("expected a boolean".to_string())),
            VariantKind::Single { values } => match value {
                VariantValue::Single(v) if values.contains(v) => Ok(value.clone()),
                _ => Err(invalid(format!("allowed values: {}", values.join(", ")))),
            },
        }
    }
}

/// User-requested variant values, in the order given
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantSelection {
    values: IndexMap<String, VariantValue>,
}

impl VariantSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `+ddeve ~ddg4 cxxstd=17`
    pub fn parse(s: &str) -> Result<Self> {
        let mut selection = Self::default();
        for (name, value) in condition::parse_variant_list(s)? {
            selection.set(&name, value);
        }
        Ok(selection)
    }

    /// Set a value; a later setting overrides an earlier one
    pub fn set(&mut self, name: &str, value: VariantValue) -> &mut Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn enable(&mut self, name: &str) -> &mut Self {
        self.set(name, VariantValue::Bool(true))
    }

    pub fn disable(&mut self, name: &str) -> &mut Self {
        self.set(name, VariantValue::Bool(false))
    }

    pub fn get(&self, name: &str) -> Option<&VariantValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VariantValue)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Display for VariantSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(name, value)| condition::format_variant(name, value))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

impl TryFrom<String> for VariantSelection {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        VariantSelection::parse(&s)
    }
}

impl From<VariantSelection> for String {
    fn from(s: VariantSelection) -> Self {
        s.to_string()
    }
}

/// Final variant values for a build, in declaration order
///
/// Declared variants whose `when` condition did not hold are inactive and
/// have no value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ResolvedVariants {
    values: IndexMap<String, VariantValue>,
    #[serde(skip)]
    declared: BTreeSet<String>,
}

impl ResolvedVariants {
    /// Create an empty set that knows which names are declared
    pub fn new(declared: impl IntoIterator<Item = String>) -> Self {
        Self {
            values: IndexMap::new(),
            declared: declared.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, name: &str, value: VariantValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Value of a declared variant, `None` when inactive
    pub fn lookup(&self, name: &str) -> Result<Option<&VariantValue>> {
        if !self.declared.contains(name) {
            return Err(Error::UndeclaredVariant(name.to_string()));
        }
        Ok(self.values.get(name))
    }

    pub fn get(&self, name: &str) -> Option<&VariantValue> {
        self.values.get(name)
    }

    /// Whether a boolean variant is active and enabled
    pub fn is_enabled(&self, name: &str) -> Result<bool> {
        Ok(self
            .lookup(name)?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VariantValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Display for ResolvedVariants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(name, value)| condition::format_variant(name, value))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// Apply defaults and activation conditions to a user selection
///
/// Unconditional variants are resolved first so that conditional ones can
/// refer to them. A conditional variant may only see variants resolved before
/// it.
pub fn resolve_variants(
    package: &str,
    declared: &[Variant],
    selection: &VariantSelection,
    version: &Version,
    dependencies: &BTreeMap<String, DependencyState>,
    compiler: Option<&CompilerSpec>,
) -> Result<ResolvedVariants> {
    for (name, _) in selection.iter() {
        if !declared.iter().any(|v| &v.name == name) {
            return Err(Error::UnknownVariant {
                package: package.to_string(),
                variant: name.clone(),
            });
        }
    }

    let names = declared.iter().map(|v| v.name.clone());
    let mut partial = ResolvedVariants::new(names.clone());

    let ordered = declared
        .iter()
        .filter(|v| !v.is_conditional())
        .chain(declared.iter().filter(|v| v.is_conditional()));

    for variant in ordered {
        if variant.is_conditional() {
            let ctx = EvalContext {
                version,
                variants: &partial,
                dependencies,
                compiler,
            };
            if !variant.when.evaluate(&ctx)? {
                if selection.get(&variant.name).is_some() {
                    return Err(Error::VariantNotApplicable {
                        variant: variant.name.clone(),
                        condition: variant.when.to_string(),
                    });
                }
                tracing::debug!("Variant {} inactive for {}@{}", variant.name, package, version);
                continue;
            }
        }

        let value = match selection.get(&variant.name) {
            Some(requested) => variant.coerce(requested)?,
            None => variant.default.clone(),
        };
        partial.insert(&variant.name, value);
    }

    let mut resolved = ResolvedVariants::new(names);
    for variant in declared {
        if let Some(value) = partial.get(&variant.name) {
            resolved.insert(&variant.name, value.clone());
        }
    }

    Ok(resolved)
}
