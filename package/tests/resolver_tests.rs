//! Tests for resolving DD4hep requests into build plans

use assert_matches::assert_matches;
use dd4hep_package::catalog::dd4hep::{recipe, SUBPACKAGES};
use dd4hep_package::recipe::PatchSource;
use dd4hep_package::{
    Dd4hep, DefineValue, DependencyState, Error, Resolution, ResolveRequest, Resolver,
    SourceLocation, Version,
};

fn boost(cxxstd: &str) -> DependencyState {
    let (_, state) =
        DependencyState::parse(&format!("boost@1.84.0 cxxstd={} +iostreams", cxxstd)).unwrap();
    state.with_prefix("/opt/boost")
}

fn request(version: &str, variants: &str) -> ResolveRequest {
    ResolveRequest::new(Version::parse(version).unwrap())
        .with_variants(variants)
        .unwrap()
        .with_dependency("boost", boost("20"))
}

fn resolve(pkg: &Dd4hep, req: &ResolveRequest) -> dd4hep_package::Result<Resolution> {
    Resolver::new(pkg).resolve(req)
}

fn define(res: &Resolution, key: &str) -> DefineValue {
    res.define(key)
        .unwrap_or_else(|| panic!("missing define {}", key))
        .value
        .clone()
}

/// The catalog recipe plus older releases, for version-dependent behavior
fn with_versions(versions: &[&str]) -> Dd4hep {
    let mut r = recipe().unwrap();
    for v in versions {
        r.version(v, &"0".repeat(64)).unwrap();
    }
    Dd4hep::from_recipe(r)
}

mod subpackage_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_all_subpackages_by_default() {
        let pkg = Dd4hep::new().unwrap();
        let res = resolve(&pkg, &request("1.32", "")).unwrap();
        assert_eq!(
            define(&res, "DD4HEP_BUILD_PACKAGES"),
            DefineValue::String(SUBPACKAGES.join(" "))
        );
    }

    #[test]
    fn test_disabled_subpackages_are_dropped_in_order() {
        let pkg = Dd4hep::new().unwrap();
        let res = resolve(&pkg, &request("1.32", "~ddg4 ~ddeve ~ddalign")).unwrap();
        assert_eq!(
            define(&res, "DD4HEP_BUILD_PACKAGES"),
            DefineValue::String("DDCond DDCAD DDRec DDDetectors DDDigi UtilityApps".to_string())
        );
        assert_eq!(define(&res, "DD4HEP_USE_GEANT4"), DefineValue::Bool(false));
    }

    #[test]
    fn test_selection_order_does_not_matter() {
        let pkg = Dd4hep::new().unwrap();
        let a = resolve(&pkg, &request("1.32", "~ddcad ~dddigi")).unwrap();
        let b = resolve(&pkg, &request("1.32", "~dddigi ~ddcad")).unwrap();
        assert_eq!(a.cmake_args(), b.cmake_args());
    }

    #[test]
    fn test_nothing_enabled() {
        let pkg = Dd4hep::new().unwrap();
        let res = resolve(
            &pkg,
            &request(
                "1.32",
                "~ddcad ~ddg4 ~ddrec ~dddetectors ~ddcond ~ddalign ~dddigi ~ddeve ~utilityapps",
            ),
        )
        .unwrap();
        assert_eq!(
            define(&res, "DD4HEP_BUILD_PACKAGES"),
            DefineValue::String(String::new())
        );
    }
}

mod conflict_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dddetectors_requires_ddrec() {
        let pkg = Dd4hep::new().unwrap();
        assert_matches!(
            resolve(&pkg, &request("1.32", "~ddrec")),
            Err(Error::Conflict { message, .. })
                if message == "Need to enable +ddrec to build +dddetectors."
        );
        assert!(resolve(&pkg, &request("1.32", "~ddrec ~dddetectors")).is_ok());
    }

    #[test]
    fn test_conflict_reported_before_missing_boost() {
        let pkg = Dd4hep::new().unwrap();
        let req = ResolveRequest::new(Version::parse("1.32").unwrap())
            .with_variants("+dddetectors ~ddrec")
            .unwrap();
        assert_matches!(resolve(&pkg, &req), Err(Error::Conflict { .. }));
    }

    #[test]
    fn test_ddeve_with_root_without_webgui() {
        let pkg = Dd4hep::new().unwrap();
        let (_, root) = DependencyState::parse(
            "root@6.32.02 cxxstd=20 +gdml +math +python +root7 +geom +opengl +x ~webgui",
        )
        .unwrap();
        let req = request("1.32", "").with_dependency("root", root.clone());
        assert_matches!(resolve(&pkg, &req), Err(Error::Conflict { .. }));

        let req = request("1.32", "~ddeve").with_dependency("root", root);
        assert!(resolve(&pkg, &req).is_ok());
    }

    #[test]
    fn test_ddeve_requires_root_webgui() {
        let pkg = Dd4hep::new().unwrap();
        let (_, root) = DependencyState::parse(
            "root@6.30.04 cxxstd=20 +gdml +math +python +root7 +geom +opengl +x",
        )
        .unwrap();
        let req = request("1.32", "").with_dependency("root", root.clone());
        assert_matches!(resolve(&pkg, &req), Err(Error::RequirementNotMet { .. }));

        let root = root.with_variant("webgui", dd4hep_package::VariantValue::Bool(true));
        let req = request("1.32", "").with_dependency("root", root);
        assert!(resolve(&pkg, &req).is_ok());
    }

    #[test]
    fn test_new_root_with_old_release() {
        let pkg = with_versions(&["1.27"]);
        let (_, root) =
            DependencyState::parse("root@6.32.02 cxxstd=20 +webgui +root7").unwrap();
        let req = request("1.27", "").with_dependency("root", root);
        assert_matches!(
            resolve(&pkg, &req),
            Err(Error::Conflict { constraint, .. }) if constraint.starts_with("^root@6.31.1:")
        );
    }
}

mod variant_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hepmc3_gz_needs_hepmc3() {
        let pkg = Dd4hep::new().unwrap();
        assert_matches!(
            resolve(&pkg, &request("1.32", "+hepmc3-gz")),
            Err(Error::VariantNotApplicable { .. })
        );

        let res = resolve(&pkg, &request("1.32", "+hepmc3 +hepmc3-gz")).unwrap();
        let names: Vec<&str> = res.dependencies.iter().map(|d| d.name.as_str()).collect();
        for dep in ["hepmc3", "bzip2", "xz", "zlib-api"] {
            assert!(names.contains(&dep), "missing {}", dep);
        }
    }

    #[test]
    fn test_hepmc3_gz_unavailable_before_1_26() {
        let pkg = with_versions(&["1.25"]);
        let res = resolve(&pkg, &request("1.25", "+hepmc3")).unwrap();
        assert!(!res.spec.variants.is_active("hepmc3-gz"));
        assert_matches!(
            resolve(&pkg, &request("1.25", "+hepmc3 +hepmc3-gz")),
            Err(Error::VariantNotApplicable { .. })
        );
    }

    #[test]
    fn test_compression_support_follows_hepmc3_version() {
        let pkg = Dd4hep::new().unwrap();
        let res = resolve(&pkg, &request("1.32", "+hepmc3")).unwrap();
        assert_eq!(
            define(&res, "DD4HEP_HEPMC3_COMPRESSION_SUPPORT"),
            DefineValue::Bool(false)
        );

        let req = request("1.32", "+hepmc3")
            .with_dependency("hepmc3", DependencyState::new(Version::parse("3.2.7").unwrap()));
        let res = resolve(&pkg, &req).unwrap();
        assert_eq!(
            define(&res, "DD4HEP_HEPMC3_COMPRESSION_SUPPORT"),
            DefineValue::Bool(true)
        );
    }

    #[test]
    fn test_compression_off_when_hepmc3_disabled_despite_state() {
        let pkg = Dd4hep::new().unwrap();
        let req = request("1.32", "~hepmc3")
            .with_dependency("hepmc3", DependencyState::new(Version::parse("3.2.7").unwrap()));
        let res = resolve(&pkg, &req).unwrap();
        assert_eq!(
            define(&res, "DD4HEP_HEPMC3_COMPRESSION_SUPPORT"),
            DefineValue::Bool(false)
        );
        assert!(res.spec.dependency("hepmc3").is_none());
        assert!(res.dependencies.iter().all(|d| d.name != "hepmc3"));
        assert!(res.spec.dependency("boost").is_some());
    }

    #[test]
    fn test_cxxstd_define_and_propagation() {
        let pkg = Dd4hep::new().unwrap();
        let req = request("1.32", "cxxstd=17").with_dependency("boost", boost("17"));
        let res = resolve(&pkg, &req).unwrap();
        assert_eq!(
            define(&res, "CMAKE_CXX_STANDARD"),
            DefineValue::String("17".to_string())
        );
        let podio = res.dependencies.iter().find(|d| d.name == "podio").unwrap();
        assert_eq!(podio.constraint.to_string(), "@0.16.7: cxxstd=17");

        assert_matches!(
            resolve(&pkg, &request("1.32", "cxxstd=17")),
            Err(Error::UnsatisfiedDependency { package, .. }) if package == "boost"
        );
    }

    #[test]
    fn test_invalid_selections() {
        let pkg = Dd4hep::new().unwrap();
        assert_matches!(
            resolve(&pkg, &request("1.32", "cxxstd=11")),
            Err(Error::InvalidVariantValue { .. })
        );
        assert_matches!(
            resolve(&pkg, &request("1.32", "+opengl")),
            Err(Error::UnknownVariant { .. })
        );
        assert_matches!(
            resolve(&pkg, &request("1.31", "")),
            Err(Error::UnknownVersion { .. })
        );
    }
}

mod dependency_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_dependencies_in_declaration_order() {
        let pkg = Dd4hep::new().unwrap();
        let res = resolve(&pkg, &request("1.32", "")).unwrap();
        let names: Vec<&str> = res.dependencies.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "c", "cxx", "cmake", "boost", "root", "geant4", "assimp", "py-pytest",
                "edm4hep", "podio", "python"
            ]
        );

        let cmake = &res.dependencies[2];
        assert_eq!(cmake.constraint.to_string(), "@3.14:");
        assert!(cmake.types.build && !cmake.types.link);

        let pytest = res.dependencies.iter().find(|d| d.name == "py-pytest").unwrap();
        assert!(pytest.types.test);
    }

    #[test]
    fn test_old_release_caps_root_and_podio() {
        let pkg = with_versions(&["1.21"]);
        let res = resolve(&pkg, &request("1.21", "")).unwrap();

        let root = res.dependencies.iter().find(|d| d.name == "root").unwrap();
        assert_eq!(root.constraint.versions.to_string(), "6.8:6.27");

        let podio = res.dependencies.iter().find(|d| d.name == "podio").unwrap();
        assert_eq!(podio.constraint.versions.to_string(), ":0.16.3");
    }

    #[test]
    fn test_supplied_state_checked_against_edges() {
        let pkg = Dd4hep::new().unwrap();
        let (_, geant4) = DependencyState::parse("geant4@10.1 cxxstd=20").unwrap();
        let req = request("1.32", "").with_dependency("geant4", geant4);
        assert_matches!(
            resolve(&pkg, &req),
            Err(Error::UnsatisfiedDependency { package, .. }) if package == "geant4"
        );

        // Not needed without DDG4
        let (_, geant4) = DependencyState::parse("geant4@10.1").unwrap();
        let req = request("1.32", "~ddg4").with_dependency("geant4", geant4);
        assert!(resolve(&pkg, &req).is_ok());
    }

    #[test]
    fn test_boost_prefix_is_required() {
        let pkg = Dd4hep::new().unwrap();
        let req = ResolveRequest::new(Version::parse("1.32").unwrap());
        assert_matches!(resolve(&pkg, &req), Err(Error::MissingDependency(_)));

        let res = resolve(&pkg, &request("1.32", "")).unwrap();
        assert_eq!(
            define(&res, "BOOST_ROOT"),
            DefineValue::String("/opt/boost".to_string())
        );
    }
}

mod patch_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn patch_names(res: &Resolution) -> Vec<String> {
        res.patches
            .iter()
            .map(|p| match &p.source {
                PatchSource::Local { path } => path.display().to_string(),
                PatchSource::Remote { url, .. } => url
                    .split('/')
                    .nth(3)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }

    #[test]
    fn test_patches_by_version() {
        let pkg = with_versions(&["1.17", "1.21"]);

        let res = resolve(&pkg, &request("1.17", "")).unwrap();
        assert_eq!(patch_names(&res), vec!["cmake_language.patch", "murnanedaniel"]);

        let res = resolve(&pkg, &request("1.21", "")).unwrap();
        assert_eq!(patch_names(&res), vec!["AIDASoft", "murnanedaniel"]);

        let res = resolve(&pkg, &request("1.32", "")).unwrap();
        assert_eq!(patch_names(&res), vec!["murnanedaniel"]);

        let res = resolve(&pkg, &request("master", "")).unwrap();
        assert_eq!(patch_names(&res), vec!["murnanedaniel"]);
    }
}

mod source_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_release_and_branch_sources() {
        let pkg = Dd4hep::new().unwrap();

        let res = resolve(&pkg, &request("1.32", "")).unwrap();
        assert_eq!(
            res.source,
            SourceLocation::Archive {
                url: "https://github.com/AIDASoft/DD4hep/archive/v01-32.tar.gz".to_string(),
                sha256: Some(
                    "8bde4eab9af9841e040447282ea7df3a16e4bcec587c3a1e32f41987da9b1b4d".to_string()
                ),
            }
        );

        let res = resolve(&pkg, &request("master", "")).unwrap();
        assert_eq!(
            res.source,
            SourceLocation::Git {
                repository: "https://github.com/AIDASoft/DD4hep.git".to_string(),
                branch: "master".to_string(),
            }
        );
    }
}

mod determinism_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identical_requests_give_identical_output() {
        let pkg = Dd4hep::new().unwrap();
        let req = request("1.32", "+hepmc3 +lcio ~ddeve cxxstd=20").with_tests(true);

        let first = resolve(&pkg, &req).unwrap();
        let second = resolve(&pkg, &req).unwrap();
        assert_eq!(first.cmake_args(), second.cmake_args());
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());

        let fresh = Dd4hep::new().unwrap();
        assert_eq!(
            resolve(&fresh, &req).unwrap().to_json().unwrap(),
            first.to_json().unwrap()
        );
    }

    #[test]
    fn test_define_order_is_fixed() {
        let pkg = Dd4hep::new().unwrap();
        let res = resolve(&pkg, &request("1.32", "")).unwrap();
        let keys: Vec<&str> = res.defines.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "BUILD_DOCS",
                "DD4HEP_USE_EDM4HEP",
                "DD4HEP_USE_XERCESC",
                "DD4HEP_USE_TBB",
                "DD4HEP_USE_GEANT4",
                "DD4HEP_USE_LCIO",
                "DD4HEP_USE_HEPMC3",
                "DD4HEP_USE_GEANT4_UNITS",
                "DD4HEP_BUILD_DEBUG",
                "CMAKE_CXX_STANDARD",
                "DD4HEP_HEPMC3_COMPRESSION_SUPPORT",
                "DD4HEP_LOAD_ASSIMP",
                "BUILD_TESTING",
                "BOOST_ROOT",
                "Boost_NO_BOOST_CMAKE",
                "DD4HEP_BUILD_PACKAGES",
            ]
        );
        assert_eq!(res.cmake_args()[0], "-DBUILD_DOCS:BOOL=OFF");
        assert_eq!(res.cmake_args()[12], "-DBUILD_TESTING:BOOL=OFF");
    }
}
