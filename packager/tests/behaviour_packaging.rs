//! Behaviour-driven tests for the package stage.
//!
//! These scenarios run the built-in lightningcpp rule table over synthetic
//! build output. Tests use the rstest-bdd v0.5.0 mutable world pattern.

use camino::{Utf8Path, Utf8PathBuf};
use lightning_packager::options::{BuildOptions, OptionOverride};
use lightning_packager::packaging::{ArtifactSet, PackageError, Packager};
use lightning_packager::platform::Platform;
use lightning_packager::recipe::Recipe;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::fs;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// World types
// ---------------------------------------------------------------------------

struct PackagingWorld {
    _temp_dir: TempDir,
    root: Utf8PathBuf,
    recipe: Recipe,
    overrides: Vec<OptionOverride>,
    results: Vec<Result<ArtifactSet, PackageError>>,
}

#[fixture]
fn world() -> PackagingWorld {
    let temp_dir = TempDir::new().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).expect("utf8 temp dir");
    fs::create_dir_all(root.join("install")).expect("install dir");
    PackagingWorld {
        _temp_dir: temp_dir,
        root,
        recipe: Recipe::builtin().expect("builtin recipe"),
        overrides: Vec::new(),
        results: Vec::new(),
    }
}

impl PackagingWorld {
    fn output_dir(&self) -> Utf8PathBuf {
        self.root.join("install")
    }

    fn package_dir(&self) -> Utf8PathBuf {
        self.root.join("package")
    }

    fn package(&mut self, platform: &str) {
        let platform: Platform = platform.parse().expect("known platform");
        let options =
            BuildOptions::resolve(&self.recipe.options, &self.overrides).expect("valid options");
        let packager = Packager::new(self.package_dir(), platform);
        let result = packager.package(&self.output_dir(), &self.recipe.rules, &options);
        self.results.push(result);
    }

    fn artifacts(&self) -> &ArtifactSet {
        match self.results.last() {
            Some(Ok(artifacts)) => artifacts,
            Some(Err(err)) => panic!("packaging failed: {err}"),
            None => panic!("packaging was not run"),
        }
    }
}

fn artifact_paths(artifacts: &ArtifactSet) -> Vec<&str> {
    artifacts.iter().map(|a| a.path().as_str()).collect()
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a build output containing \"{path}\"")]
fn given_build_output_file(world: &mut PackagingWorld, path: String) {
    let full = world.output_dir().join(&path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(&full, format!("contents of {path}")).expect("write output file");
}

#[given("the option \"{name}\" set to \"{value}\"")]
fn given_option(world: &mut PackagingWorld, name: String, value: String) {
    let item: OptionOverride = format!("{name}={value}").parse().expect("override");
    world.overrides.push(item);
}

#[when("the output is packaged for \"{platform}\"")]
fn when_packaged(world: &mut PackagingWorld, platform: String) {
    world.package(&platform);
}

#[when("the output is packaged twice for \"{platform}\"")]
fn when_packaged_twice(world: &mut PackagingWorld, platform: String) {
    world.package(&platform);
    world.package(&platform);
}

#[then("the package contains exactly \"{expected}\"")]
fn then_package_contains(world: &mut PackagingWorld, expected: String) {
    let expected: Vec<&str> = expected.split(", ").collect();
    assert_eq!(artifact_paths(world.artifacts()), expected);

    for path in &expected {
        assert!(
            world.package_dir().join(path).is_file(),
            "{path} missing from package directory"
        );
    }
}

#[then("no packaged file is a shared library")]
fn then_no_shared_library(world: &mut PackagingWorld) {
    let artifacts = world.artifacts();
    assert!(!artifacts.is_empty(), "expected some artifacts");
    for path in artifact_paths(artifacts) {
        let name = Utf8Path::new(path).file_name().unwrap_or_default();
        assert!(
            !name.contains(".so") && !name.contains(".dylib"),
            "shared library {path} was packaged"
        );
    }
}

#[then("packaging fails because \"{pattern}\" matched nothing")]
fn then_packaging_fails(world: &mut PackagingWorld, pattern: String) {
    match world.results.last() {
        Some(Err(err @ PackageError::NoMatches { .. })) => {
            assert!(err.to_string().contains(&pattern), "unexpected error: {err}");
        }
        other => panic!("expected NoMatches, got {other:?}"),
    }
}

#[then("both runs produce the same artifacts")]
fn then_runs_identical(world: &mut PackagingWorld) {
    let [first, second] = world.results.as_slice() else {
        panic!("expected exactly two packaging runs");
    };
    let first = first.as_ref().expect("first run");
    let second = second.as_ref().expect("second run");
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/packaging.feature",
    name = "Static build packages flattened headers and the static archive"
)]
fn scenario_static_layout(world: PackagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/packaging.feature",
    name = "Shared build on Linux packages versioned shared objects"
)]
fn scenario_shared_linux(world: PackagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/packaging.feature",
    name = "Static build on macOS never ships dynamic libraries"
)]
fn scenario_static_macos(world: PackagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/packaging.feature",
    name = "Build output without headers fails packaging"
)]
fn scenario_missing_headers(world: PackagingWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/packaging.feature",
    name = "Packaging unchanged output twice yields the same artifacts"
)]
fn scenario_idempotent(world: PackagingWorld) {
    let _ = world;
}
