//! DD4hep detector description toolkit
//!
//! Releases are published as dash-separated, zero-padded tags (`v01-12-01`),
//! sub-packages are toggled individually, and the test suite only works
//! against an installed tree, so tests run after `install` instead of in the
//! usual check phase.

use crate::builder::PhaseContext;
use crate::cmake::{CMakeArgs, Generator};
use crate::environment::{find_libraries, EnvironmentModifications, LibraryList};
use crate::package::Package;
use crate::recipe::Recipe;
use crate::resolver::ConcreteSpec;
use crate::source::{base_url, dashed_release_url};
use crate::types::{DependencyTypes, Version};
use crate::variant::Variant;
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Sub-packages in the order CMake expects them
pub const SUBPACKAGES: [&str; 9] = [
    "DDG4",
    "DDCond",
    "DDCAD",
    "DDRec",
    "DDDetectors",
    "DDAlign",
    "DDDigi",
    "DDEve",
    "UtilityApps",
];

const CXXSTD_VALUES: [&str; 3] = ["14", "17", "20"];

pub struct Dd4hep {
    recipe: Recipe,
}

impl Dd4hep {
    pub fn new() -> Result<Self> {
        Ok(Self { recipe: recipe()? })
    }

    /// Wrap a modified recipe, e.g. one with extra versions declared
    pub fn from_recipe(recipe: Recipe) -> Self {
        Self { recipe }
    }

    /// Sub-packages whose variant is enabled, in declaration order
    pub fn enabled_subpackages(spec: &ConcreteSpec) -> Result<Vec<&'static str>> {
        let mut enabled = Vec::new();
        for package in SUBPACKAGES {
            if spec.is_enabled(&package.to_lowercase())? {
                enabled.push(package);
            }
        }
        Ok(enabled)
    }
}

/// The DD4hep recipe declarations
pub fn recipe() -> Result<Recipe> {
    let mut r = Recipe::new(
        "dd4hep",
        "https://github.com/AIDASoft/DD4hep/archive/v01-12-01.tar.gz",
    );
    r.description = "DD4hep is a software framework for providing a complete solution for \
        full detector description (geometry, materials, visualization, readout, alignment, \
        calibration, etc.) for the full experiment life cycle (detector concept development, \
        detector optimization, construction, operation). It offers a consistent description \
        through a single source of detector information for simulation, reconstruction, \
        analysis, etc."
        .to_string();
    r.homepage = "https://dd4hep.web.cern.ch/dd4hep/".to_string();
    r.git = Some("https://github.com/AIDASoft/DD4hep.git".to_string());
    r.maintainers = vec![
        "vvolkl".to_string(),
        "drbenmorgan".to_string(),
        "jmcarcell".to_string(),
    ];
    r.tags = vec!["hep".to_string()];
    r.license = "LGPL-3.0-or-later".to_string();
    r.generator = Generator::Ninja;

    r.branch("master", "master")?;
    r.version(
        "1.32",
        "8bde4eab9af9841e040447282ea7df3a16e4bcec587c3a1e32f41987da9b1b4d",
    )?;

    // Build file generation fails with older CMake language handling
    r.patch_local("cmake_language.patch", "@:1.17")?;
    // Missing SimCaloHits with the LCIO format
    r.patch_remote(
        "https://github.com/AIDASoft/DD4hep/commit/2c77055fb05744a4d367123c634bcb42291df030.patch?full_index=1",
        "7bac1e08d2f83edb467da7f950b841021ecc649cc4cf21fd9043bd6d757c4e05",
        "@1.19:1.23",
    )?;
    r.patch_remote(
        "https://github.com/murnanedaniel/DD4hep/commit/bbcca3ca435d3302f56778303e2b4a229312578c.patch?full_index=1",
        "7bac1e08d2f83edb467da7f950b841021ecc649cc4cf21fd9043bd6d757c4e05",
        "",
    )?;

    // Sub-packages
    r.variant(Variant::bool("ddcad", true, "Enable CAD interface based on Assimp"))
        .variant(Variant::bool("ddg4", true, "Enable the simulation part based on Geant4"))
        .variant(Variant::bool("ddrec", true, "Build DDRec subpackage."))
        .variant(Variant::bool("dddetectors", true, "Build DDDetectors subpackage."))
        .variant(Variant::bool("ddcond", true, "Build DDCond subpackage."))
        .variant(Variant::bool("ddalign", true, "Build DDAlign subpackage."))
        .variant(Variant::bool("dddigi", true, "Build DDDigi subpackage."))
        .variant(Variant::bool("ddeve", true, "Build DDEve subpackage."))
        .variant(Variant::bool("utilityapps", true, "Build UtilityApps subpackage."));

    // Other build options
    r.variant(Variant::bool("doc", false, "Build documentation"))
        .variant(Variant::bool(
            "xercesc",
            false,
            "Enable 'Detector Builders' based on XercesC",
        ))
        .variant(Variant::bool("hepmc3", false, "Enable build with hepmc3"))
        .variant(
            Variant::bool("hepmc3-gz", false, "Enable build with compressed hepmc3")
                .when("@1.26: +hepmc3")?,
        )
        .variant(Variant::bool("lcio", false, "Enable build with lcio"))
        .variant(Variant::bool("edm4hep", true, "Enable build with edm4hep"))
        .variant(Variant::bool("geant4units", false, "Use geant4 units throughout"))
        .variant(Variant::bool("tbb", false, "Enable build with tbb"))
        .variant(Variant::bool(
            "debug",
            false,
            "Enable debug build flag - adds extra info in some places in addition to the debug build type",
        ))
        .variant(Variant::single(
            "cxxstd",
            "20",
            &CXXSTD_VALUES,
            "Use the specified C++ standard when building.",
        ));

    let build = DependencyTypes::BUILD;
    let link = DependencyTypes::DEFAULT;

    r.depends_on("c", "", build)?;
    r.depends_on("cxx", "", build)?;
    r.depends_on("cmake @3.12:", "", build)?;
    r.depends_on("cmake @3.14:", "@1.26:", build)?;

    for std in CXXSTD_VALUES {
        for pkg in ["boost", "root"] {
            r.depends_on(&format!("{} cxxstd={}", pkg, std), &format!("cxxstd={}", std), link)?;
        }
    }

    r.depends_on("boost @1.49:", "", link)?;
    r.depends_on("boost +system +filesystem", "%gcc@:7", link)?;
    r.depends_on("root @6.08: +gdml +math +python", "", link)?;
    // DDCoreGraphics needs ROOT::ROOTHistDraw
    r.depends_on("root @6.12.2: +root7", "@1.26:", link)?;

    r.depends_on("root @6.08: +geom +opengl +x", "+ddeve", link)?;
    r.depends_on("root @:6.27", "+ddeve @:1.23", link)?;
    r.conflicts("^root ~webgui", "+ddeve ^root@6.28:", None)?;
    // DDEve_Interface needs ROOT::ROOTGeomViewer from ROOT 6.27 on
    r.requires("^root +root7 +webgui", "+ddeve @1.24: ^root @6.27:", None)?;
    r.depends_on(
        "root @6.08: +gdml +geom +math +python +x +opengl",
        "+utilityapps",
        link,
    )?;

    r.depends_on("boost +iostreams", "+ddg4", link)?;
    r.depends_on("geant4@10.2.2:", "+ddg4", link)?;
    for std in CXXSTD_VALUES {
        r.depends_on(
            &format!("geant4 cxxstd={}", std),
            &format!("+ddg4 cxxstd={}", std),
            link,
        )?;
    }

    r.depends_on("imagemagick", "+doc", link)?;
    r.depends_on("xerces-c", "+xercesc", link)?;
    r.depends_on("assimp@5.0.2:", "+ddcad", link)?;
    r.depends_on("hepmc3", "+hepmc3", link)?;
    r.depends_on("hepmc3@3.2.6:", "+hepmc3-gz", link)?;
    r.depends_on("bzip2", "+hepmc3-gz", link)?;
    r.depends_on("xz", "+hepmc3-gz", link)?;
    r.depends_on("zlib-api", "+hepmc3-gz", link)?;
    r.depends_on("tbb", "+tbb", link)?;
    r.depends_on("intel-tbb@:2020.3", "+tbb @:1.23", link)?;
    r.depends_on("lcio", "+lcio", link)?;
    r.depends_on("py-pytest", "", DependencyTypes::BUILD_TEST)?;

    // edm4hep and podio only support C++17 and newer
    for std in ["17", "20"] {
        for pkg in ["edm4hep", "podio"] {
            r.depends_on(
                &format!("{} cxxstd={}", pkg, std),
                &format!("+edm4hep cxxstd={}", std),
                link,
            )?;
        }
    }
    r.depends_on("edm4hep@0.10.5:", "+edm4hep @1.31:", link)?;
    r.depends_on("podio@:0.16.03", "+edm4hep @:1.23", link)?;
    r.depends_on("podio@:0", "+edm4hep @:1.29", link)?;
    r.depends_on("podio@0.16:", "+edm4hep @1.24:", link)?;
    r.depends_on("podio@0.16.3:", "+edm4hep @1.26:", link)?;
    r.depends_on("podio@0.16.7:", "+edm4hep @1.31:", link)?;

    r.extends("python")?;

    r.conflicts(
        "^cmake@3.16:3.17.2",
        "@:1.18",
        Some("cmake version with buggy FindPython breaks dd4hep cmake config"),
    )?;
    r.conflicts(
        "~ddrec+dddetectors",
        "",
        Some("Need to enable +ddrec to build +dddetectors."),
    )?;
    r.conflicts("^root@6.31.1:", "@:1.27", None)?;

    Ok(r)
}

#[async_trait]
impl Package for Dd4hep {
    fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    fn url_for_version(&self, version: &Version) -> Result<String> {
        dashed_release_url(&base_url(&self.recipe.url)?, version)
    }

    fn cmake_args(&self, spec: &ConcreteSpec) -> Result<CMakeArgs> {
        let variants = &spec.variants;
        let mut args = CMakeArgs::new();

        args.define_from_variant("BUILD_DOCS", "doc", variants)?;
        args.define_from_variant("DD4HEP_USE_EDM4HEP", "edm4hep", variants)?;
        args.define_from_variant("DD4HEP_USE_XERCESC", "xercesc", variants)?;
        args.define_from_variant("DD4HEP_USE_TBB", "tbb", variants)?;
        args.define_from_variant("DD4HEP_USE_GEANT4", "ddg4", variants)?;
        args.define_from_variant("DD4HEP_USE_LCIO", "lcio", variants)?;
        args.define_from_variant("DD4HEP_USE_HEPMC3", "hepmc3", variants)?;
        args.define_from_variant("DD4HEP_USE_GEANT4_UNITS", "geant4units", variants)?;
        args.define_from_variant("DD4HEP_BUILD_DEBUG", "debug", variants)?;
        args.define_from_variant("CMAKE_CXX_STANDARD", "cxxstd", variants)?;

        // Compressed hepmc3 input needs hepmc3 3.2.6
        args.define(
            "DD4HEP_HEPMC3_COMPRESSION_SUPPORT",
            spec.satisfies("@1.26: ^hepmc3@3.2.6:")?,
        );
        // Assimp comes from the dependency, not an on-the-fly download
        args.define("DD4HEP_LOAD_ASSIMP", false);
        args.define("BUILD_TESTING", spec.run_tests);

        let boost_prefix = spec
            .dependency("boost")
            .and_then(|d| d.prefix.as_deref())
            .ok_or_else(|| {
                Error::MissingDependency("boost prefix (required for BOOST_ROOT)".to_string())
            })?;
        args.define("BOOST_ROOT", boost_prefix);
        args.define("Boost_NO_BOOST_CMAKE", true);

        let enabled = Self::enabled_subpackages(spec)?;
        args.define("DD4HEP_BUILD_PACKAGES", enabled.join(" "));

        Ok(args)
    }

    /// Every DD4hep library starts with `libDD`; there is no `libdd4hep`
    fn libs(&self, prefix: &Path) -> Result<LibraryList> {
        find_libraries(prefix, "libDD", true, true)
    }

    fn setup_run_environment(&self, prefix: &Path, env: &mut EnvironmentModifications) -> Result<()> {
        // ddsim locates the DDDetectors directory through these
        env.set("DD4hepINSTALL", prefix)
            .set("DD4HEP", prefix.join("examples"))
            .set("DD4hep_DIR", prefix)
            .set("DD4hep_ROOT", prefix);

        if let Some(dir) = self.libs(prefix)?.directories().first() {
            env.prepend_path("LD_LIBRARY_PATH", dir);
        }
        Ok(())
    }

    async fn check(&self, _ctx: &PhaseContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Tests need the installed tree
    async fn after_install(&self, ctx: &PhaseContext<'_>) -> Result<()> {
        if ctx.run_tests() {
            info!("Running DD4hep tests in {}", ctx.build_dir().display());
            ctx.run_build_target("test").await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_declares_everything() {
        let r = recipe().unwrap();
        assert_eq!(r.versions.len(), 2);
        assert_eq!(r.variants.len(), 19);
        assert_eq!(r.patches.len(), 3);
        assert_eq!(r.conflicts.len(), 4);
        assert_eq!(r.requirements.len(), 1);
        assert_eq!(r.extends, vec!["python"]);
    }

    #[test]
    fn test_url_for_version() {
        let pkg = Dd4hep::new().unwrap();
        let url = |v: &str| pkg.url_for_version(&Version::parse(v).unwrap()).unwrap();
        assert_eq!(
            url("1.32"),
            "https://github.com/AIDASoft/DD4hep/archive/v01-32.tar.gz"
        );
        assert_eq!(
            url("1.12.1"),
            "https://github.com/AIDASoft/DD4hep/archive/v01-12-01.tar.gz"
        );
    }

    #[test]
    fn test_validates_with_shared_patch_warning() {
        let result = Dd4hep::new().unwrap().validate();
        assert!(result.is_ok(), "errors: {:?}", result.errors());
        assert_eq!(result.warnings().len(), 1);
    }
}
