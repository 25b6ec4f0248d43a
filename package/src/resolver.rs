//! Resolution of a package request into a concrete build plan
//!
//! Resolution is a pure function of the recipe and the request: it picks
//! variant values, rejects conflicts, activates dependency edges and patches,
//! and asks the package for its CMake defines. Whole-graph solving is left to
//! the host; concrete dependency states are supplied in the request.

use crate::cmake::{CMakeArgs, CMakeDefine, Generator};
use crate::condition::{Condition, EvalContext, SpecConstraint};
use crate::package::Package;
use crate::recipe::Patch;
use crate::source::SourceLocation;
use crate::types::{CompilerSpec, DependencyState, DependencyTypes, Version};
use crate::variant::{resolve_variants, ResolvedVariants, VariantSelection};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

/// What the caller asks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub version: Version,
    #[serde(default)]
    pub variants: VariantSelection,
    #[serde(default)]
    pub compiler: Option<CompilerSpec>,
    #[serde(default)]
    pub run_tests: bool,
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencyState>,
}

impl ResolveRequest {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            variants: VariantSelection::default(),
            compiler: None,
            run_tests: false,
            dependencies: BTreeMap::new(),
        }
    }

    /// Load a request from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn with_variants(mut self, variants: &str) -> Result<Self> {
        self.variants = VariantSelection::parse(variants)?;
        Ok(self)
    }

    pub fn with_dependency(mut self, name: &str, state: DependencyState) -> Self {
        self.dependencies.insert(name.to_string(), state);
        self
    }

    pub fn with_compiler(mut self, compiler: CompilerSpec) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn with_tests(mut self, run_tests: bool) -> Self {
        self.run_tests = run_tests;
        self
    }
}

/// A fully resolved package selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConcreteSpec {
    pub name: String,
    pub version: Version,
    pub variants: ResolvedVariants,
    pub dependencies: BTreeMap<String, DependencyState>,
    pub compiler: Option<CompilerSpec>,
    pub run_tests: bool,
}

impl ConcreteSpec {
    fn context(&self) -> EvalContext<'_> {
        EvalContext {
            version: &self.version,
            variants: &self.variants,
            dependencies: &self.dependencies,
            compiler: self.compiler.as_ref(),
        }
    }

    /// Evaluate a condition in constraint syntax, e.g. `@1.26: ^hepmc3@3.2.6:`
    pub fn satisfies(&self, condition: &str) -> Result<bool> {
        self.satisfies_condition(&Condition::parse(condition)?)
    }

    pub fn satisfies_condition(&self, condition: &Condition) -> Result<bool> {
        condition.evaluate(&self.context())
    }

    /// Whether a boolean variant is active and enabled
    pub fn is_enabled(&self, variant: &str) -> Result<bool> {
        self.variants.is_enabled(variant)
    }

    /// Concrete state of a dependency, when the host supplied one
    pub fn dependency(&self, name: &str) -> Option<&DependencyState> {
        self.dependencies.get(name)
    }
}

impl std::fmt::Display for ConcreteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)?;
        if !self.variants.is_empty() {
            write!(f, " {}", self.variants)?;
        }
        if let Some(compiler) = &self.compiler {
            write!(f, " %{}", compiler)?;
        }
        Ok(())
    }
}

/// A dependency required by the resolution, merged over all active edges
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivatedDependency {
    pub name: String,
    pub constraint: SpecConstraint,
    pub types: DependencyTypes,
    pub state: Option<DependencyState>,
}

impl std::fmt::Display for ActivatedDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{} [{}]", self.name, self.constraint, self.types)
    }
}

/// Output of resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub spec: ConcreteSpec,
    pub source: SourceLocation,
    pub generator: Generator,
    pub dependencies: Vec<ActivatedDependency>,
    pub patches: Vec<Patch>,
    pub defines: Vec<CMakeDefine>,
}

impl Resolution {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Defines rendered as `-DKEY:TYPE=VALUE`
    pub fn cmake_args(&self) -> Vec<String> {
        self.defines.iter().map(|d| d.to_arg()).collect()
    }

    pub fn define(&self, key: &str) -> Option<&CMakeDefine> {
        self.defines.iter().find(|d| d.key == key)
    }
}

/// Resolves requests against one package
pub struct Resolver<'a, P: Package + ?Sized> {
    package: &'a P,
}

impl<'a, P: Package + ?Sized> Resolver<'a, P> {
    pub fn new(package: &'a P) -> Self {
        Self { package }
    }

    pub fn resolve(&self, request: &ResolveRequest) -> Result<Resolution> {
        let recipe = self.package.recipe();
        recipe.declared_version(&request.version)?;

        info!("Resolving {}@{}", recipe.name, request.version);

        // Only states of activated edges are visible to `^dep` predicates.
        // Dropping a state can deactivate further edges, so iterate until
        // the visible set stops shrinking.
        let mut visible = request.dependencies.clone();
        let spec = loop {
            let variants = resolve_variants(
                &recipe.name,
                &recipe.variants,
                &request.variants,
                &request.version,
                &visible,
                request.compiler.as_ref(),
            )?;

            let spec = ConcreteSpec {
                name: recipe.name.clone(),
                version: request.version.clone(),
                variants,
                dependencies: visible,
                compiler: request.compiler.clone(),
                run_tests: request.run_tests,
            };

            let active = self.active_edge_names(&spec)?;
            if spec.dependencies.keys().all(|name| active.contains(name)) {
                break spec;
            }
            visible = spec
                .dependencies
                .into_iter()
                .filter(|(name, _)| {
                    let keep = active.contains(name);
                    if !keep {
                        debug!("Ignoring state for inactive dependency {}", name);
                    }
                    keep
                })
                .collect();
        };

        self.check_conflicts(&spec)?;
        self.check_requirements(&spec)?;
        let dependencies = self.activate_dependencies(&spec)?;

        let mut patches = Vec::new();
        for patch in &recipe.patches {
            if spec.satisfies_condition(&patch.when)? {
                debug!("Patch active: {}", patch.source);
                patches.push(patch.clone());
            }
        }

        let defines: CMakeArgs = self.package.cmake_args(&spec)?;
        let source = self.package.source_for_version(&spec.version)?;

        info!(
            "Resolved {} ({} dependencies, {} patches, {} defines)",
            spec,
            dependencies.len(),
            patches.len(),
            defines.len()
        );

        Ok(Resolution {
            spec,
            source,
            generator: recipe.generator,
            dependencies,
            patches,
            defines: defines.into_defines(),
        })
    }

    fn check_conflicts(&self, spec: &ConcreteSpec) -> Result<()> {
        for conflict in &self.package.recipe().conflicts {
            if spec.satisfies_condition(&conflict.when)?
                && spec.satisfies_condition(&conflict.constraint)?
            {
                let mut constraint = conflict.constraint.to_string();
                if !conflict.when.is_always() {
                    constraint = format!("{} when {}", constraint, conflict.when);
                }
                return Err(Error::Conflict {
                    constraint,
                    message: conflict
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("{} does not support this combination", spec.name)),
                });
            }
        }
        Ok(())
    }

    fn check_requirements(&self, spec: &ConcreteSpec) -> Result<()> {
        for requirement in &self.package.recipe().requirements {
            if spec.satisfies_condition(&requirement.when)?
                && !spec.satisfies_condition(&requirement.constraint)?
            {
                return Err(Error::RequirementNotMet {
                    requirement: requirement.constraint.to_string(),
                    message: requirement.message.clone().unwrap_or_else(|| {
                        format!("{} requires it when {}", spec.name, requirement.when)
                    }),
                });
            }
        }
        Ok(())
    }

    fn active_edge_names(&self, spec: &ConcreteSpec) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for edge in &self.package.recipe().dependencies {
            if spec.satisfies_condition(&edge.when)? {
                names.insert(edge.name.clone());
            }
        }
        Ok(names)
    }

    /// Activate edges in declaration order, merging edges on the same package
    fn activate_dependencies(&self, spec: &ConcreteSpec) -> Result<Vec<ActivatedDependency>> {
        let mut activated: Vec<ActivatedDependency> = Vec::new();

        for edge in &self.package.recipe().dependencies {
            if !spec.satisfies_condition(&edge.when)? {
                continue;
            }

            let state = spec.dependency(&edge.name);
            if let Some(state) = state {
                if !edge.constraint.satisfied_by(state) {
                    return Err(Error::UnsatisfiedDependency {
                        package: edge.name.clone(),
                        required: edge.to_string(),
                        found: state.to_string(),
                    });
                }
            }

            match activated.iter_mut().find(|d| d.name == edge.name) {
                Some(existing) => {
                    merge_constraint(&edge.name, &mut existing.constraint, &edge.constraint)?;
                    existing.types = union_types(existing.types, edge.types);
                }
                None => activated.push(ActivatedDependency {
                    name: edge.name.clone(),
                    constraint: edge.constraint.clone(),
                    types: edge.types,
                    state: state.cloned(),
                }),
            }
        }

        Ok(activated)
    }
}

fn merge_constraint(
    package: &str,
    existing: &mut SpecConstraint,
    incoming: &SpecConstraint,
) -> Result<()> {
    for (name, value) in &incoming.variants {
        if let Some((_, current)) = existing.variants.iter().find(|(n, _)| n == name) {
            if !current.matches(value) {
                return Err(Error::UnsatisfiedDependency {
                    package: package.to_string(),
                    required: format!("{}{}", package, incoming),
                    found: format!("{}{}", package, existing),
                });
            }
        }
    }

    let before = existing.clone();
    existing.merge(incoming);

    if let (Some(lo), Some(_)) = (&existing.versions.lo, &existing.versions.hi) {
        if !existing.versions.contains(lo) {
            return Err(Error::UnsatisfiedDependency {
                package: package.to_string(),
                required: format!("{}{}", package, incoming),
                found: format!("{}{}", package, before),
            });
        }
    }

    Ok(())
}

fn union_types(a: DependencyTypes, b: DependencyTypes) -> DependencyTypes {
    DependencyTypes {
        build: a.build || b.build,
        link: a.link || b.link,
        run: a.run || b.run,
        test: a.test || b.test,
    }
}
