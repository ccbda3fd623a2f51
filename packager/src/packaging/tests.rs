//! Tests for rule evaluation and file copying.

use super::*;
use crate::options::{OptionDecl, OptionOverride, OptionValue};
use crate::platform::LibraryKind;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Tree {
    _temp: TempDir,
    output: Utf8PathBuf,
    package: Utf8PathBuf,
}

impl Tree {
    fn write(&self, relative: &str, contents: &str) {
        let path = self.output.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write file");
    }
}

#[fixture]
fn tree() -> Tree {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf8 temp dir");
    let output = root.join("install");
    fs::create_dir_all(&output).expect("create output");
    Tree {
        _temp: temp,
        output,
        package: root.join("package"),
    }
}

fn lightning_rules() -> Vec<CopyRule> {
    vec![
        CopyRule::glob("*.h", "include").mandatory(),
        CopyRule::library(LibraryKind::Shared, "lib")
            .when_option("shared", OptionValue::Bool(true)),
        CopyRule::library(LibraryKind::Static, "lib")
            .when_option("shared", OptionValue::Bool(false)),
    ]
}

fn options(shared: bool) -> BuildOptions {
    let decls = [OptionDecl::boolean("shared", false, Some("BUILD_SHARED_LIBS"))];
    let overrides: Vec<OptionOverride> = vec![
        format!("shared={shared}")
            .parse()
            .expect("well-formed override"),
    ];
    BuildOptions::resolve(&decls, &overrides).expect("valid options")
}

fn paths(artifacts: &ArtifactSet) -> Vec<&str> {
    artifacts.iter().map(|a| a.path().as_str()).collect()
}

#[rstest]
fn static_build_yields_flattened_headers_and_archive(tree: Tree) {
    tree.write("foo.h", "// foo");
    tree.write("bar/baz.h", "// baz");
    tree.write("liblightning.a", "archive");

    let packager = Packager::new(tree.package.clone(), Platform::Linux);
    let artifacts = packager
        .package(&tree.output, &lightning_rules(), &options(false))
        .expect("package");

    assert_eq!(
        paths(&artifacts),
        vec!["include/baz.h", "include/foo.h", "lib/liblightning.a"]
    );
    assert!(tree.package.join("include/baz.h").is_file());
    assert!(tree.package.join("lib/liblightning.a").is_file());
}

#[rstest]
#[case::linux(Platform::Linux)]
#[case::macos(Platform::Macos)]
fn static_build_never_ships_shared_libraries(tree: Tree, #[case] platform: Platform) {
    tree.write("include/http/server.h", "");
    tree.write("lib/liblightning.so.1", "");
    tree.write("lib/liblightning.dylib", "");
    tree.write("lib/liblightning.a", "");

    let artifacts = Packager::new(tree.package.clone(), platform)
        .package(&tree.output, &lightning_rules(), &options(false))
        .expect("package");

    assert!(
        artifacts
            .iter()
            .all(|a| !a.path().as_str().contains(".so") && !a.path().as_str().contains(".dylib")),
        "unexpected shared library in {artifacts:?}"
    );
}

#[rstest]
fn shared_build_on_linux_ships_versioned_objects(tree: Tree) {
    tree.write("include/http/server.h", "");
    tree.write("lib/liblightning.so", "");
    tree.write("lib/liblightning.so.0.1", "");
    tree.write("lib/liblightning.a", "");

    let artifacts = Packager::new(tree.package.clone(), Platform::Linux)
        .package(&tree.output, &lightning_rules(), &options(true))
        .expect("package");

    assert_eq!(
        paths(&artifacts),
        vec![
            "include/server.h",
            "lib/liblightning.so",
            "lib/liblightning.so.0.1"
        ]
    );
}

#[rstest]
fn shared_build_on_macos_selects_dylib(tree: Tree) {
    tree.write("server.h", "");
    tree.write("liblightning.dylib", "");
    tree.write("liblightning.so", "");

    let artifacts = Packager::new(tree.package.clone(), Platform::Macos)
        .package(&tree.output, &lightning_rules(), &options(true))
        .expect("package");

    assert_eq!(paths(&artifacts), vec!["include/server.h", "lib/liblightning.dylib"]);
}

#[rstest]
fn mandatory_rule_without_matches_fails(tree: Tree) {
    tree.write("liblightning.a", "");

    let err = Packager::new(tree.package.clone(), Platform::Linux)
        .package(&tree.output, &lightning_rules(), &options(false))
        .expect_err("headers are mandatory");

    assert!(matches!(err, PackageError::NoMatches { .. }));
    assert!(err.to_string().contains("*.h"));
}

#[rstest]
fn optional_rule_without_matches_is_skipped(tree: Tree) {
    tree.write("foo.h", "");

    let artifacts = Packager::new(tree.package.clone(), Platform::Linux)
        .package(&tree.output, &lightning_rules(), &options(false))
        .expect("package");

    assert_eq!(paths(&artifacts), vec!["include/foo.h"]);
}

#[rstest]
fn keep_path_preserves_structure(tree: Tree) {
    tree.write("include/http/mod/file.h", "");
    let rules = [CopyRule::glob("*.h", "include").from_dir("include").keep_path()];

    let artifacts = Packager::new(tree.package.clone(), Platform::Linux)
        .package(&tree.output, &rules, &options(false))
        .expect("package");

    assert_eq!(paths(&artifacts), vec!["include/http/mod/file.h"]);
}

#[rstest]
fn source_subdirectory_limits_the_search(tree: Tree) {
    tree.write("liblightning.a", "root");
    tree.write("lib/liblightning.a", "lib");
    let rules = [CopyRule::library(LibraryKind::Static, "lib").from_dir("lib")];

    let artifacts = Packager::new(tree.package.clone(), Platform::Linux)
        .package(&tree.output, &rules, &options(false))
        .expect("package");

    let artifact = artifacts.iter().next().expect("one artifact");
    assert_eq!(artifacts.len(), 1);
    assert!(artifact.source().ends_with("lib/liblightning.a"));
}

#[rstest]
fn last_match_wins_on_collision(tree: Tree) {
    tree.write("a/config.h", "first");
    tree.write("b/config.h", "second");
    let rules = [CopyRule::glob("*.h", "include")];

    let artifacts = Packager::new(tree.package.clone(), Platform::Linux)
        .package(&tree.output, &rules, &options(false))
        .expect("package");

    assert_eq!(paths(&artifacts), vec!["include/config.h"]);
    let copied = fs::read_to_string(tree.package.join("include/config.h")).expect("read");
    assert_eq!(copied, "second");
}

#[rstest]
fn later_rule_overrides_earlier_rule(tree: Tree) {
    tree.write("version.h", "generated");
    tree.write("override/version.h", "pinned");
    let rules = [
        CopyRule::glob("version.h", "include"),
        CopyRule::glob("*.h", "include").from_dir("override"),
    ];

    let artifacts = Packager::new(tree.package.clone(), Platform::Linux)
        .package(&tree.output, &rules, &options(false))
        .expect("package");

    assert_eq!(artifacts.len(), 1);
    let copied = fs::read_to_string(tree.package.join("include/version.h")).expect("read");
    assert_eq!(copied, "pinned");
}

#[rstest]
fn packaging_twice_is_idempotent(tree: Tree) {
    tree.write("foo.h", "");
    tree.write("bar/baz.h", "");
    tree.write("liblightning.a", "");
    let packager = Packager::new(tree.package.clone(), Platform::Linux);

    let first = packager
        .package(&tree.output, &lightning_rules(), &options(false))
        .expect("first run");
    let second = packager
        .package(&tree.output, &lightning_rules(), &options(false))
        .expect("second run");

    assert_eq!(first, second);
}

#[rstest]
fn nested_package_directory_is_not_rescanned(tree: Tree) {
    tree.write("foo.h", "");
    let nested = Packager::new(tree.output.join("package"), Platform::Linux);
    let rules = [CopyRule::glob("*.h", "include").keep_path()];

    nested
        .package(&tree.output, &rules, &options(false))
        .expect("first run");
    let second = nested
        .package(&tree.output, &rules, &options(false))
        .expect("second run");

    assert_eq!(paths(&second), vec!["include/foo.h"]);
}

#[rstest]
fn missing_build_output_is_reported(tree: Tree) {
    let err = Packager::new(tree.package.clone(), Platform::Linux)
        .package(&tree.output.join("absent"), &lightning_rules(), &options(false))
        .expect_err("missing output");
    assert!(matches!(err, PackageError::MissingOutput { .. }));
}

#[rstest]
fn plan_does_not_touch_the_package_directory(tree: Tree) {
    tree.write("foo.h", "");
    let packager = Packager::new(tree.package.clone(), Platform::Linux);

    let plan = packager
        .plan(&tree.output, &lightning_rules(), &options(false))
        .expect("plan");

    assert_eq!(plan.len(), 1);
    assert!(!tree.package.exists());
}
