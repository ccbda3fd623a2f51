//! Declarative copy rules.
//!
//! A [`CopyRule`] selects files from the build output either by an explicit
//! glob or by a [`LibraryKind`] that is resolved per platform at packaging
//! time. Rules may be gated on a build option value.

use crate::options::{BuildOptions, OptionValue};
use crate::platform::{LibraryKind, Platform};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a rule selects files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// A glob matched against paths relative to the rule's source root.
    Glob(String),
    /// Libraries of the given kind, using the target platform's naming.
    Library(LibraryKind),
}

impl Selector {
    /// Resolve the selector to a concrete glob for `platform`.
    #[must_use]
    pub fn pattern_for(&self, platform: Platform) -> &str {
        match self {
            Self::Glob(pattern) => pattern,
            Self::Library(kind) => platform.library_pattern(*kind),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glob(pattern) => f.write_str(pattern),
            Self::Library(kind) => write!(f, "<{kind} libraries>"),
        }
    }
}

/// Activation condition: the rule applies only when `option == equals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    /// Option to inspect.
    pub option: String,
    /// Value the option must have.
    pub equals: OptionValue,
}

/// Short human-readable identification of a rule for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLabel {
    selector: String,
    destination: Utf8PathBuf,
}

impl RuleLabel {
    /// Build a label from a selector description and destination.
    #[must_use]
    pub fn new(selector: impl Into<String>, destination: impl Into<Utf8PathBuf>) -> Self {
        Self {
            selector: selector.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for RuleLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` -> {}/", self.selector, self.destination)
    }
}

/// One step of the packaging rule table.
///
/// Matches are flattened into `destination` unless `keep_path` is set, in
/// which case their path relative to the source root is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCopyRule")]
pub struct CopyRule {
    /// File selection.
    pub selector: Selector,
    /// Subdirectory of the package root receiving matches.
    pub destination: Utf8PathBuf,
    /// Preserve directory structure below the source root.
    pub keep_path: bool,
    /// Subdirectory of the build output to search instead of its root.
    pub source: Option<Utf8PathBuf>,
    /// Fail packaging when nothing matches.
    pub mandatory: bool,
    /// Gate the rule on an option value.
    pub when: Option<Condition>,
}

impl CopyRule {
    /// Optional, flattening rule copying files matching `pattern`.
    #[must_use]
    pub fn glob(pattern: &str, destination: &str) -> Self {
        Self::new(Selector::Glob(pattern.to_owned()), destination)
    }

    /// Optional, flattening rule copying platform libraries of `kind`.
    #[must_use]
    pub fn library(kind: LibraryKind, destination: &str) -> Self {
        Self::new(Selector::Library(kind), destination)
    }

    fn new(selector: Selector, destination: &str) -> Self {
        Self {
            selector,
            destination: Utf8PathBuf::from(destination),
            keep_path: false,
            source: None,
            mandatory: false,
            when: None,
        }
    }

    /// Mark the rule as mandatory.
    #[must_use]
    pub fn mandatory(self) -> Self {
        Self {
            mandatory: true,
            ..self
        }
    }

    /// Preserve relative directory structure.
    #[must_use]
    pub fn keep_path(self) -> Self {
        Self {
            keep_path: true,
            ..self
        }
    }

    /// Search `dir` below the build output instead of its root.
    #[must_use]
    pub fn from_dir(self, dir: &str) -> Self {
        Self {
            source: Some(Utf8PathBuf::from(dir)),
            ..self
        }
    }

    /// Apply the rule only when `option` has `value`.
    #[must_use]
    pub fn when_option(self, option: &str, value: OptionValue) -> Self {
        Self {
            when: Some(Condition {
                option: option.to_owned(),
                equals: value,
            }),
            ..self
        }
    }

    /// Whether the rule's condition holds for `options`.
    #[must_use]
    pub fn is_active(&self, options: &BuildOptions) -> bool {
        self.when
            .as_ref()
            .is_none_or(|condition| options.get(&condition.option) == Some(&condition.equals))
    }

    /// Diagnostic label for this rule.
    #[must_use]
    pub fn label(&self) -> RuleLabel {
        RuleLabel::new(self.selector.to_string(), self.destination.clone())
    }
}

/// Error produced when a rule in a recipe is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid copy rule: {reason}")]
pub struct RuleError {
    reason: String,
}

impl RuleError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCopyRule {
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    library: Option<LibraryKind>,
    destination: Utf8PathBuf,
    #[serde(default)]
    keep_path: bool,
    #[serde(default)]
    source: Option<Utf8PathBuf>,
    #[serde(default)]
    mandatory: bool,
    #[serde(default)]
    when: Option<Condition>,
}

impl TryFrom<RawCopyRule> for CopyRule {
    type Error = RuleError;

    fn try_from(raw: RawCopyRule) -> Result<Self, Self::Error> {
        let selector = match (raw.pattern, raw.library) {
            (Some(pattern), None) => {
                glob::Pattern::new(&pattern)
                    .map_err(|e| RuleError::new(format!("pattern `{pattern}`: {e}")))?;
                Selector::Glob(pattern)
            }
            (None, Some(kind)) => Selector::Library(kind),
            (Some(_), Some(_)) => {
                return Err(RuleError::new("set either `pattern` or `library`, not both"));
            }
            (None, None) => return Err(RuleError::new("one of `pattern` or `library` is required")),
        };
        ensure_contained(&raw.destination, "destination")?;
        if let Some(source) = &raw.source {
            ensure_contained(source, "source")?;
        }
        Ok(Self {
            selector,
            destination: raw.destination,
            keep_path: raw.keep_path,
            source: raw.source,
            mandatory: raw.mandatory,
            when: raw.when,
        })
    }
}

/// Reject absolute paths and `..` so rules cannot reach outside their roots.
fn ensure_contained(path: &Utf8Path, field: &str) -> Result<(), RuleError> {
    let escapes = path
        .components()
        .any(|c| !matches!(c, Utf8Component::Normal(_) | Utf8Component::CurDir));
    if escapes {
        return Err(RuleError::new(format!(
            "{field} `{path}` must be a relative path inside the package"
        )));
    }
    Ok(())
}
