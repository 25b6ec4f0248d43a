//! DD4hep package recipe
//!
//! A declarative build recipe for the DD4hep detector description toolkit,
//! together with the small framework it is written against.
//!
//! # Architecture
//!
//! - **Recipe**: versions, variants, dependency edges, patches, conflicts and
//!   requirements declared as plain data
//! - **Conditions**: `when` expressions parsed into a tagged tree and
//!   evaluated by a pure interpreter
//! - **Resolver**: turns a request (version, variant selection, dependency
//!   states) into a deterministic build plan
//! - **Source**: version-to-URL mapping and checksum verification
//! - **Builder**: configure, build, check, install and post-install phases
//!   over an external CMake/Ninja toolchain
//! - **Catalog**: the DD4hep recipe itself

pub mod builder;
pub mod catalog;
pub mod cmake;
pub mod condition;
pub mod config;
pub mod environment;
pub mod error;
pub mod package;
pub mod recipe;
pub mod resolver;
pub mod source;
pub mod types;
pub mod validation;
pub mod variant;

pub use builder::{
    BuildOptions, BuildReport, BuildTool, Builder, CommandTool, Invocation, Phase, Toolchain,
};
pub use catalog::Dd4hep;
pub use cmake::{CMakeArgs, CMakeDefine, DefineValue, Generator};
pub use condition::{Condition, SpecConstraint};
pub use config::Config;
pub use environment::{EnvironmentModifications, LibraryList};
pub use error::{Error, Result};
pub use package::Package;
pub use recipe::Recipe;
pub use resolver::{ConcreteSpec, Resolution, ResolveRequest, Resolver};
pub use source::SourceLocation;
pub use types::*;
pub use validation::{ValidationIssue, ValidationResult};
pub use variant::{ResolvedVariants, Variant, VariantSelection};
