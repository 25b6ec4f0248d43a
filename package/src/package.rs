//! The package abstraction
//!
//! A [`Package`] pairs a declarative [`Recipe`] with the behavior that cannot
//! be expressed as data: URL derivation, CMake arguments, run environment and
//! phase hooks. Hooks have defaults matching a plain CMake package; recipes
//! override only what differs.

use crate::builder::PhaseContext;
use crate::cmake::CMakeArgs;
use crate::environment::{find_libraries, EnvironmentModifications, LibraryList};
use crate::recipe::{Recipe, VersionSource};
use crate::resolver::ConcreteSpec;
use crate::source::SourceLocation;
use crate::types::Version;
use crate::validation::{self, ValidationResult};
use crate::Result;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait Package: Send + Sync {
    fn recipe(&self) -> &Recipe;

    fn name(&self) -> &str {
        &self.recipe().name
    }

    /// Archive URL for any version, declared or not
    fn url_for_version(&self, version: &Version) -> Result<String>;

    /// Where to fetch a declared version from
    fn source_for_version(&self, version: &Version) -> Result<SourceLocation> {
        let recipe = self.recipe();
        let decl = recipe.declared_version(version)?;

        match (&decl.source, &recipe.git) {
            (VersionSource::Branch(branch), Some(git)) => Ok(SourceLocation::Git {
                repository: git.clone(),
                branch: branch.clone(),
            }),
            (VersionSource::Branch(_), None) => Ok(SourceLocation::Archive {
                url: self.url_for_version(version)?,
                sha256: None,
            }),
            (VersionSource::Sha256(sha), _) => Ok(SourceLocation::Archive {
                url: self.url_for_version(version)?,
                sha256: Some(sha.clone()),
            }),
        }
    }

    /// CMake defines for a resolved spec
    fn cmake_args(&self, spec: &ConcreteSpec) -> Result<CMakeArgs>;

    /// Libraries installed under `prefix`; defaults to `lib<name>*`
    fn libs(&self, prefix: &Path) -> Result<LibraryList> {
        find_libraries(prefix, &format!("lib{}", self.name()), true, true)
    }

    fn setup_run_environment(
        &self,
        _prefix: &Path,
        _env: &mut EnvironmentModifications,
    ) -> Result<()> {
        Ok(())
    }

    /// Pre-install check phase; runs the `test` target when tests are requested
    async fn check(&self, ctx: &PhaseContext<'_>) -> Result<()> {
        if ctx.run_tests() {
            ctx.run_build_target("test").await?;
        }
        Ok(())
    }

    /// Runs once, after a successful install
    async fn after_install(&self, _ctx: &PhaseContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Lint the recipe together with the package's URL scheme
    fn validate(&self) -> ValidationResult {
        validation::validate_package(self)
    }
}
