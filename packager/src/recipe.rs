//! Declarative recipes.
//!
//! A recipe is a TOML document describing one package: its identity
//! (`[package]`), where its sources come from (`[source]`), how to build them
//! (`[build]`), the options it accepts (`[options.<name>]`) and the ordered
//! copy rules (`[[copy]]`). The lightningcpp recipe is compiled into the
//! binary and used when no `--recipe` is given.
//!
//! ```toml
//! [package]
//! name = "lightningcpp"
//! version = "master"
//! license = "LGPL"
//!
//! [source]
//! url = "https://github.com/lightningcpp/lightningcpp/archive/{version}.zip"
//!
//! [[copy]]
//! pattern = "*.h"
//! destination = "include"
//! ```

use crate::descriptor::{DescriptorError, PackageDescriptor};
use crate::options::{OptionDecl, OptionError, OptionSpec};
use crate::packaging::CopyRule;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// The lightningcpp recipe shipped with the binary.
pub const BUILTIN_RECIPE: &str = include_str!("../../recipes/lightningcpp.toml");

/// Errors arising from loading a recipe.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// The recipe file could not be read.
    #[error("failed to read recipe {path}: {source}")]
    Read {
        /// Path of the recipe.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The recipe is not valid TOML or has unexpected keys.
    #[error("invalid recipe {origin}: {source}")]
    Parse {
        /// Path of the recipe, or `<builtin>`.
        origin: String,
        /// The TOML error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// The `[package]` table is invalid.
    #[error("invalid package metadata: {0}")]
    Descriptor(#[from] DescriptorError),

    /// An `[options.*]` declaration is invalid.
    #[error(transparent)]
    Option(#[from] OptionError),

    /// A `[[copy]]` rule refers to options inconsistently.
    #[error("copy rule {index}: {reason}")]
    Rule {
        /// One-based position of the rule in the recipe.
        index: usize,
        /// Description of the inconsistency.
        reason: String,
    },

    /// The `[source]` table is invalid.
    #[error("invalid [source]: {reason}")]
    Source {
        /// Description of the problem.
        reason: String,
    },
}

/// Where a recipe's sources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// An archive to download; may contain `{name}` and `{version}`.
    Url(String),
    /// A local directory whose contents are exported.
    Local(Utf8PathBuf),
}

/// Which build driver a recipe uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Configure and install with CMake.
    Cmake,
    /// No build step; package the sources directly.
    #[default]
    #[serde(rename = "none")]
    Passthrough,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cmake => "cmake",
            Self::Passthrough => "none",
        })
    }
}

/// A validated recipe.
#[derive(Debug, Clone)]
pub struct Recipe {
    /// Package identity and requirements.
    pub descriptor: PackageDescriptor,
    /// Source location.
    pub source: SourceLocation,
    /// Build driver.
    pub driver: DriverKind,
    /// CMake generator, if the recipe pins one.
    pub generator: Option<String>,
    /// Declared options, ordered by name.
    pub options: Vec<OptionDecl>,
    /// Copy rules in evaluation order.
    pub rules: Vec<CopyRule>,
    /// Directory relative paths in the recipe resolve against.
    pub base_dir: Utf8PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeFile {
    package: PackageDescriptor,
    #[serde(default)]
    source: Option<SourceTable>,
    #[serde(default)]
    build: BuildTable,
    #[serde(default)]
    options: BTreeMap<String, OptionSpec>,
    #[serde(default)]
    copy: Vec<CopyRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceTable {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    path: Option<Utf8PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildTable {
    #[serde(default)]
    driver: DriverKind,
    #[serde(default)]
    generator: Option<String>,
}

impl Recipe {
    /// Load and validate the recipe at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`RecipeError`] if the file cannot be read or is invalid.
    pub fn load(path: &Utf8Path) -> Result<Self, RecipeError> {
        let text = std::fs::read_to_string(path).map_err(|source| RecipeError::Read {
            path: path.to_owned(),
            source,
        })?;
        let base_dir = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.to_owned(),
            _ => Utf8PathBuf::from("."),
        };
        Self::parse(&text, path.as_str(), base_dir)
    }

    /// The built-in lightningcpp recipe.
    ///
    /// # Errors
    ///
    /// Returns a [`RecipeError`] only if the embedded recipe is invalid.
    pub fn builtin() -> Result<Self, RecipeError> {
        Self::parse(BUILTIN_RECIPE, "<builtin>", Utf8PathBuf::from("."))
    }

    /// Parse recipe text, resolving relative paths against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns a [`RecipeError`] describing the first problem found.
    pub fn parse(text: &str, origin: &str, base_dir: Utf8PathBuf) -> Result<Self, RecipeError> {
        let file: RecipeFile = toml::from_str(text).map_err(|e| RecipeError::Parse {
            origin: origin.to_owned(),
            source: Box::new(e),
        })?;
        file.package.validate()?;

        let options = file
            .options
            .into_iter()
            .map(|(name, spec)| OptionDecl::from_spec(&name, spec))
            .collect::<Result<Vec<_>, _>>()?;
        check_conditions(&file.copy, &options)?;

        let source = match file.source {
            None => SourceLocation::Local(base_dir.clone()),
            Some(SourceTable {
                url: Some(url),
                path: None,
            }) => SourceLocation::Url(url),
            Some(SourceTable {
                url: None,
                path: Some(path),
            }) => SourceLocation::Local(base_dir.join(path)),
            Some(SourceTable {
                url: Some(_),
                path: Some(_),
            }) => {
                return Err(RecipeError::Source {
                    reason: "set either `url` or `path`, not both".to_owned(),
                });
            }
            Some(SourceTable {
                url: None,
                path: None,
            }) => {
                return Err(RecipeError::Source {
                    reason: "one of `url` or `path` is required".to_owned(),
                });
            }
        };

        Ok(Self {
            descriptor: file.package,
            source,
            driver: file.build.driver,
            generator: file.build.generator,
            options,
            rules: file.copy,
            base_dir,
        })
    }

    /// The source URL with `{name}` and `{version}` substituted.
    ///
    /// Returns `None` for recipes exporting local sources.
    #[must_use]
    pub fn source_url(&self) -> Option<String> {
        match &self.source {
            SourceLocation::Url(template) => Some(
                template
                    .replace("{name}", &self.descriptor.name)
                    .replace("{version}", &self.descriptor.version),
            ),
            SourceLocation::Local(_) => None,
        }
    }
}

/// Every `when` must name a declared option and a value in its domain.
fn check_conditions(rules: &[CopyRule], options: &[OptionDecl]) -> Result<(), RecipeError> {
    for (position, rule) in rules.iter().enumerate() {
        let Some(condition) = &rule.when else {
            continue;
        };
        let index = position + 1;
        let decl = options
            .iter()
            .find(|decl| decl.name() == condition.option)
            .ok_or_else(|| RecipeError::Rule {
                index,
                reason: format!("`when` refers to undeclared option {}", condition.option),
            })?;
        if !decl.accepts(&condition.equals) {
            return Err(RecipeError::Rule {
                index,
                reason: format!(
                    "option {} cannot equal {}; expected one of: {}",
                    condition.option,
                    condition.equals,
                    decl.describe_domain()
                ),
            });
        }
    }
    Ok(())
}
