//! Lightning packager library.
//!
//! This crate fetches, builds, and packages the lightningcpp C++ library (or
//! any project described by a recipe). A run has three stages: the source
//! archive is downloaded and extracted, an external build tool installs the
//! build into a prefix, and ordered copy rules gather the results into an
//! `include/` and `lib/` package layout. It is used by the
//! `lightning-packager` CLI binary and can be consumed programmatically.
//!
//! # Modules
//!
//! - [`builder`] - Build drivers (CMake and pass-through)
//! - [`cli`] - Command-line argument definitions
//! - [`descriptor`] - Package identity and requirement metadata
//! - [`error`] - Top-level error type wrapping every stage error
//! - [`executor`] - External command execution abstraction
//! - [`fetch`] - Downloading and extracting source archives
//! - [`options`] - Declared build options and command-line overrides
//! - [`output`] - Progress, dry-run and inspect formatting
//! - [`packaging`] - Copy rules and package layout
//! - [`pipeline`] - Stage orchestration over the work directory
//! - [`platform`] - Target platforms and library naming
//! - [`recipe`] - TOML recipe loading and the built-in recipe
//! - [`settings`] - Environment-supplied build settings

pub mod builder;
pub mod cli;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod options;
pub mod output;
pub mod packaging;
pub mod pipeline;
pub mod platform;
pub mod recipe;
pub mod settings;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
