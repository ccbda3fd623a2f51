//! Output formatting for the packager CLI.
//!
//! Progress and summaries go to stderr as plain lines. `inspect` renders an
//! [`InspectReport`] either as text or as JSON.

use crate::descriptor::PackageDescriptor;
use crate::options::BuildOptions;
use crate::pipeline::{PackageInfo, WorkLayout};
use crate::recipe::{DriverKind, Recipe};
use crate::settings::Settings;
use camino::Utf8Path;
use serde::Serialize;
use std::io::Write;

/// Write `message` and a newline, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort progress output; ignore write failures.
    }
}

/// Format a success message after packaging.
///
/// # Examples
///
/// ```
/// use camino::Utf8Path;
/// use lightning_packager::output::success_message;
///
/// let message = success_message(1, Utf8Path::new("/tmp/pkg"));
/// assert_eq!(message, "Packaged 1 artifact into /tmp/pkg");
/// ```
#[must_use]
pub fn success_message(count: usize, package_dir: &Utf8Path) -> String {
    let plural = if count == 1 { "artifact" } else { "artifacts" };
    format!("Packaged {count} {plural} into {package_dir}")
}

/// Configuration information for dry-run output.
#[derive(Debug)]
pub struct DryRunInfo<'a> {
    /// The recipe being run.
    pub recipe: &'a Recipe,
    /// Effective settings.
    pub settings: &'a Settings,
    /// Effective options.
    pub options: &'a BuildOptions,
    /// Work directory layout.
    pub layout: &'a WorkLayout,
    /// Optional parallel job count.
    pub jobs: Option<usize>,
}

impl DryRunInfo<'_> {
    /// Format the dry-run information for display.
    #[must_use]
    pub fn display_text(&self) -> String {
        let descriptor = &self.recipe.descriptor;
        let mut lines = vec![
            "Dry run - no files will be modified".to_owned(),
            String::new(),
            format!("Package: {} {}", descriptor.name, descriptor.version),
            format!("Platform: {} ({})", self.settings.os, self.settings.arch),
            format!("Build type: {}", self.settings.build_type),
            format!("Work directory: {}", self.layout.root()),
        ];
        match self.recipe.source_url() {
            Some(url) => lines.push(format!("Source: {url}")),
            None => lines.push(format!("Source: export of {}", self.recipe.base_dir)),
        }
        lines.push(format!("Build driver: {}", self.recipe.driver));
        if let Some(jobs) = self.jobs {
            lines.push(format!("Parallel jobs: {jobs}"));
        }

        lines.push(String::new());
        lines.push("Options:".to_owned());
        for (name, value) in self.options.iter() {
            lines.push(format!("  {name} = {value}"));
        }

        lines.push(String::new());
        lines.push("Copy rules:".to_owned());
        for rule in &self.recipe.rules {
            let state = if rule.is_active(self.options) {
                "active"
            } else {
                "inactive"
            };
            lines.push(format!("  - {} ({state})", rule.label()));
        }

        lines.join("\n")
    }
}

/// One copy rule as shown by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    /// Glob or library selector.
    pub selector: String,
    /// Destination directory.
    pub destination: String,
    /// Whether paths are preserved.
    pub keep_path: bool,
    /// Whether an empty match is an error.
    pub mandatory: bool,
    /// `option=value` gate, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Whether the rule applies with the effective options.
    pub active: bool,
}

/// Everything `inspect` reports about a recipe.
#[derive(Debug, Serialize)]
pub struct InspectReport<'a> {
    /// Package identity and requirements.
    pub package: &'a PackageDescriptor,
    /// Effective settings.
    pub settings: &'a Settings,
    /// Effective options.
    pub options: &'a BuildOptions,
    /// Source URL or local directory.
    pub source: String,
    /// Build driver.
    pub driver: DriverKind,
    /// Copy rules in order.
    pub rules: Vec<RuleSummary>,
    /// Consumer-facing metadata.
    pub package_info: PackageInfo,
}

impl<'a> InspectReport<'a> {
    /// Summarise `recipe` under the given settings and options.
    #[must_use]
    pub fn new(
        recipe: &'a Recipe,
        settings: &'a Settings,
        options: &'a BuildOptions,
        package_info: PackageInfo,
    ) -> Self {
        let rules = recipe
            .rules
            .iter()
            .map(|rule| RuleSummary {
                selector: rule.selector.to_string(),
                destination: rule.destination.to_string(),
                keep_path: rule.keep_path,
                mandatory: rule.mandatory,
                when: rule
                    .when
                    .as_ref()
                    .map(|c| format!("{}={}", c.option, c.equals)),
                active: rule.is_active(options),
            })
            .collect();
        Self {
            package: &recipe.descriptor,
            settings,
            options,
            source: recipe
                .source_url()
                .unwrap_or_else(|| recipe.base_dir.to_string()),
            driver: recipe.driver,
            rules,
            package_info,
        }
    }

    /// Format the report for humans.
    #[must_use]
    pub fn display_text(&self) -> String {
        let package = self.package;
        let mut lines = vec![format!(
            "{} {} ({})",
            package.name, package.version, package.license
        )];
        if let Some(description) = &package.description {
            lines.push(description.clone());
        }
        if let Some(url) = &package.url {
            lines.push(format!("Home: {url}"));
        }
        lines.push(format!("Source: {}", self.source));
        lines.push(format!("Build driver: {}", self.driver));
        lines.push(format!(
            "Settings: os={} arch={} build_type={}",
            self.settings.os, self.settings.arch, self.settings.build_type
        ));

        if !package.requires.is_empty() {
            lines.push("Requires:".to_owned());
            lines.extend(package.requires.iter().map(|r| format!("  - {r}")));
        }

        lines.push("Options:".to_owned());
        lines.extend(self.options.iter().map(|(name, value)| format!("  {name} = {value}")));

        lines.push("Copy rules:".to_owned());
        for rule in &self.rules {
            let mut line = format!("  - `{}` -> {}/", rule.selector, rule.destination);
            if let Some(when) = &rule.when {
                line.push_str(&format!(" when {when}"));
            }
            if rule.mandatory {
                line.push_str(" [mandatory]");
            }
            if !rule.active {
                line.push_str(" [inactive]");
            }
            lines.push(line);
        }

        if self.package_info.is_empty() {
            lines.push("Package info: none".to_owned());
        } else {
            lines.push(format!("Libraries: {}", self.package_info.libs.join(", ")));
            lines.push(format!("Defines: {}", self.package_info.defines.join(", ")));
        }
        lines.join("\n")
    }
}
