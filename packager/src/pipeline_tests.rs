//! Tests for stage orchestration with stubbed downloads and build tools.

use super::*;
use crate::fetch::download::MockDownloader;
use crate::options::OptionOverride;
use crate::platform::Platform;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, success_output};
use rstest::{fixture, rstest};
use std::io::Write as _;
use zip::write::SimpleFileOptions;

const ARCHIVE_URL: &str = "https://github.com/lightningcpp/lightningcpp/archive/master.zip";

const SOURCES: &[&str] = &[
    "lightningcpp-master/CMakeLists.txt",
    "lightningcpp-master/include/http/server.h",
    "lightningcpp-master/src/server.cpp",
];

struct Harness {
    _temp: tempfile::TempDir,
    layout: WorkLayout,
    recipe: Recipe,
    settings: Settings,
}

impl Harness {
    fn options(&self, overrides: &[&str]) -> BuildOptions {
        let overrides: Vec<OptionOverride> = overrides
            .iter()
            .map(|o| o.parse().expect("override"))
            .collect();
        BuildOptions::resolve(&self.recipe.options, &overrides).expect("options")
    }

    fn context<'a>(&'a self, options: &'a BuildOptions) -> PipelineContext<'a> {
        PipelineContext {
            recipe: &self.recipe,
            settings: &self.settings,
            options,
            layout: &self.layout,
            jobs: None,
            quiet: false,
        }
    }

    fn configure_call(&self, shared: &str) -> ExpectedCall {
        let layout = &self.layout;
        ExpectedCall::new(
            "cmake",
            [
                "-S".to_owned(),
                layout.source().join("lightningcpp-master").to_string(),
                "-B".to_owned(),
                layout.build().to_string(),
                format!("-DCMAKE_INSTALL_PREFIX={}", layout.install()),
                "-DCMAKE_BUILD_TYPE=Release".to_owned(),
                "-DBUILD_SAMPLES=OFF".to_owned(),
                "-DBUILD_TESTS=OFF".to_owned(),
                format!("-DBUILD_SHARED_LIBS={shared}"),
            ],
            Ok(success_output()),
        )
    }

    fn install_call(&self) -> ExpectedCall {
        ExpectedCall::new(
            "cmake",
            [
                "--build".to_owned(),
                self.layout.build().to_string(),
                "--target".to_owned(),
                "install".to_owned(),
                "--config".to_owned(),
                "Release".to_owned(),
            ],
            Ok(success_output()),
        )
    }
}

#[fixture]
fn harness() -> Harness {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf8 temp dir");
    let mut settings = Settings::host().with_platform(Platform::Linux);
    "Release".clone_into(&mut settings.build_type);
    Harness {
        _temp: temp,
        layout: WorkLayout::new(root.join("lightningcpp-master")),
        recipe: Recipe::builtin().expect("builtin recipe"),
        settings,
    }
}

fn serving_archive() -> MockDownloader {
    let mut downloader = MockDownloader::new();
    downloader
        .expect_download()
        .withf(|url, _| url == ARCHIVE_URL)
        .times(1)
        .returning(|_, dest| {
            let file = std::fs::File::create(dest).expect("create zip");
            let mut writer = zip::ZipWriter::new(file);
            for name in SOURCES {
                writer
                    .start_file(*name, SimpleFileOptions::default())
                    .expect("start file");
                writer.write_all(name.as_bytes()).expect("write entry");
            }
            writer.finish().expect("finish zip");
            Ok(())
        });
    downloader
}

fn unused_downloader() -> MockDownloader {
    let mut downloader = MockDownloader::new();
    downloader.expect_download().never();
    downloader
}

fn package_paths(report: &PackageReport) -> Vec<&str> {
    report.artifacts.iter().map(|a| a.path().as_str()).collect()
}

#[rstest]
fn full_run_packages_headers_and_static_library(harness: Harness) {
    let options = harness.options(&[]);
    let install = harness.layout.install();
    let executor = StubExecutor::new(vec![
        harness.configure_call("OFF"),
        harness
            .install_call()
            .creating(install.join("include/http/server.h"), "server")
            .creating(install.join("include/http/request.h"), "request")
            .creating(install.join("lib/liblightning.a"), "archive"),
    ]);
    let downloader = serving_archive();
    let mut stderr = Vec::new();

    let outcome = Pipeline::new(harness.context(&options), &downloader, &executor)
        .run(&mut stderr)
        .expect("pipeline run");

    executor.assert_finished();
    assert_eq!(outcome.source.file_count(), SOURCES.len());
    assert_eq!(outcome.build.output_dir, install);
    assert_eq!(
        package_paths(&outcome.package),
        vec!["include/request.h", "include/server.h", "lib/liblightning.a"]
    );
    assert!(outcome.package.manifest.is_file());
    assert!(outcome.package_info.is_empty());

    let stderr = String::from_utf8(stderr).expect("utf8 stderr");
    assert!(stderr.contains(&format!("Fetching {ARCHIVE_URL}...")));
    assert!(stderr.contains("with cmake..."));
    assert!(stderr.contains("Packaged 3 artifacts into"));
}

#[rstest]
fn shared_option_reaches_cmake_and_selects_shared_libraries(harness: Harness) {
    let options = harness.options(&["shared=true"]);
    let install = harness.layout.install();
    let executor = StubExecutor::new(vec![
        harness.configure_call("ON"),
        harness
            .install_call()
            .creating(install.join("include/http/server.h"), "server")
            .creating(install.join("lib/liblightning.so.1"), "shared object")
            .creating(install.join("lib/liblightning.a"), "archive"),
    ]);
    let downloader = serving_archive();

    let outcome = Pipeline::new(harness.context(&options), &downloader, &executor)
        .run(&mut Vec::new())
        .expect("pipeline run");

    assert_eq!(
        package_paths(&outcome.package),
        vec!["include/server.h", "lib/liblightning.so.1"]
    );
}

#[rstest]
fn rebuild_drops_files_installed_by_earlier_runs(harness: Harness) {
    let options = harness.options(&[]);
    let install = harness.layout.install();
    let first = StubExecutor::new(vec![
        harness.configure_call("OFF"),
        harness
            .install_call()
            .creating(install.join("include/http/old_api.h"), "old")
            .creating(install.join("lib/liblightning_old.a"), "old archive"),
    ]);
    let downloader = serving_archive();
    Pipeline::new(harness.context(&options), &downloader, &first)
        .run(&mut Vec::new())
        .expect("first run");

    let second = StubExecutor::new(vec![
        harness.configure_call("OFF"),
        harness
            .install_call()
            .creating(install.join("include/http/server.h"), "server")
            .creating(install.join("lib/liblightning.a"), "archive"),
    ]);
    let downloader = serving_archive();
    let outcome = Pipeline::new(harness.context(&options), &downloader, &second)
        .run(&mut Vec::new())
        .expect("second run");

    second.assert_finished();
    assert_eq!(
        package_paths(&outcome.package),
        vec!["include/server.h", "lib/liblightning.a"]
    );
    assert!(!install.join("lib/liblightning_old.a").exists());
}

#[rstest]
fn failed_configure_stops_before_packaging(harness: Harness) {
    let options = harness.options(&[]);
    let layout = &harness.layout;
    let failing = ExpectedCall::new(
        "cmake",
        harness.configure_call("OFF").args,
        Ok(failure_output(1, "", "CMake Error: asio not found")),
    );
    let executor = StubExecutor::new(vec![failing]);
    let downloader = serving_archive();

    let err = Pipeline::new(harness.context(&options), &downloader, &executor)
        .run(&mut Vec::new())
        .expect_err("configure fails");

    executor.assert_finished();
    assert!(matches!(err, PackagerError::Build(_)));
    assert!(err.to_string().contains("asio not found"));
    assert!(!layout.package().exists());
}

#[rstest]
fn build_without_sources_reports_missing_stage_input(harness: Harness) {
    let options = harness.options(&[]);
    let executor = StubExecutor::new(Vec::new());
    let downloader = unused_downloader();

    let err = Pipeline::new(harness.context(&options), &downloader, &executor)
        .build(&mut Vec::new())
        .expect_err("no sources");

    match err {
        PackagerError::MissingStageInput { stage, path } => {
            assert_eq!(stage, "build");
            assert_eq!(path, harness.layout.source());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn package_without_build_output_reports_missing_stage_input(harness: Harness) {
    let options = harness.options(&[]);
    let executor = StubExecutor::new(Vec::new());
    let downloader = unused_downloader();

    let err = Pipeline::new(harness.context(&options), &downloader, &executor)
        .package(&mut Vec::new())
        .expect_err("no install tree");

    assert!(matches!(
        err,
        PackagerError::MissingStageInput { stage: "package", .. }
    ));
}

#[rstest]
fn package_hook_replaces_a_stale_package(harness: Harness) {
    let options = harness.options(&[]);
    let install = harness.layout.install();
    fs::create_dir_all(install.join("include")).expect("install dir");
    fs::write(install.join("include/foo.h"), "foo").expect("header");
    let stale = harness.layout.package().join("lib/libold.a");
    fs::create_dir_all(stale.parent().expect("parent")).expect("stale dir");
    fs::write(&stale, "old").expect("stale file");
    let executor = StubExecutor::new(Vec::new());
    let downloader = unused_downloader();

    let report = Pipeline::new(harness.context(&options), &downloader, &executor)
        .package(&mut Vec::new())
        .expect("package");

    assert_eq!(package_paths(&report), vec!["include/foo.h"]);
    assert!(!stale.exists());
}

#[rstest]
fn quiet_pipeline_writes_no_progress(harness: Harness) {
    let options = harness.options(&[]);
    let install = harness.layout.install();
    fs::create_dir_all(install.join("include")).expect("install dir");
    fs::write(install.join("include/foo.h"), "foo").expect("header");
    let executor = StubExecutor::new(Vec::new());
    let downloader = unused_downloader();
    let mut context = harness.context(&options);
    context.quiet = true;
    let mut stderr = Vec::new();

    Pipeline::new(context, &downloader, &executor)
        .package(&mut stderr)
        .expect("package");

    assert!(stderr.is_empty());
}

#[rstest]
fn local_recipe_is_exported_and_packaged_without_a_build(harness: Harness) {
    let project = harness.layout.root().parent().expect("parent").join("project");
    fs::create_dir_all(project.join("include")).expect("project include");
    fs::write(project.join("include/api.h"), "api").expect("header");
    fs::write(project.join("README.md"), "readme").expect("readme");
    let recipe = Recipe::parse(
        r#"
[package]
name = "local"
version = "1.0"
license = "MIT"

[[copy]]
pattern = "*.h"
destination = "include"
mandatory = true
"#,
        "<test>",
        project.clone(),
    )
    .expect("recipe");
    let layout = WorkLayout::new(project.join(".work"));
    let options = BuildOptions::default();
    let executor = StubExecutor::new(Vec::new());
    let downloader = unused_downloader();
    let context = PipelineContext {
        recipe: &recipe,
        settings: &harness.settings,
        options: &options,
        layout: &layout,
        jobs: None,
        quiet: true,
    };

    let outcome = Pipeline::new(context, &downloader, &executor)
        .run(&mut Vec::new())
        .expect("pipeline run");

    assert_eq!(outcome.source.file_count(), 2);
    assert_eq!(package_paths(&outcome.package), vec!["include/api.h"]);
    executor.assert_finished();
}

#[rstest]
fn work_layout_names_stage_directories() {
    let layout = WorkLayout::new(Utf8PathBuf::from("/work/pkg"));

    assert_eq!(layout.source(), Utf8PathBuf::from("/work/pkg/source"));
    assert_eq!(layout.build(), Utf8PathBuf::from("/work/pkg/build"));
    assert_eq!(layout.install(), Utf8PathBuf::from("/work/pkg/install"));
    assert_eq!(layout.package(), Utf8PathBuf::from("/work/pkg/package"));
}

#[test]
fn default_root_ends_with_package_slug() {
    // Environments without a home directory have no cache directory.
    let Ok(root) = WorkLayout::default_root("lightningcpp-master") else {
        return;
    };
    assert!(root.as_str().contains("lightning-packager"));
    assert!(root.as_str().ends_with("lightningcpp-master"));
}
