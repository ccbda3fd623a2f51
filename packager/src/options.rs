//! Typed build options with declared domains and defaults.
//!
//! Recipes declare each option with a default and, for non-boolean options,
//! the list of accepted values. Overrides arrive as `name=value` strings and
//! are validated against the declared domain before any stage runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors arising from option declarations or overrides.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    /// An override did not have the form `name=value`.
    #[error("invalid option override \"{input}\": expected name=value")]
    MalformedOverride {
        /// The rejected input.
        input: String,
    },

    /// An override names an option the recipe does not declare.
    #[error("unknown option \"{name}\"; declared options: {declared}")]
    UnknownOption {
        /// The unknown option name.
        name: String,
        /// Comma-separated list of declared options.
        declared: String,
    },

    /// A value lies outside the option's domain.
    #[error("invalid value \"{value}\" for option {name}; expected one of: {expected}")]
    InvalidValue {
        /// The option being set.
        name: String,
        /// The rejected value.
        value: String,
        /// Comma-separated list of accepted values.
        expected: String,
    },

    /// A declaration is internally inconsistent.
    #[error("option {name} is declared incorrectly: {reason}")]
    InvalidDeclaration {
        /// The option being declared.
        name: String,
        /// Description of the inconsistency.
        reason: String,
    },
}

/// A concrete option value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// A boolean toggle.
    Bool(bool),
    /// One of an enumerated set of strings.
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// The set of values an option may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionDomain {
    /// `true` or `false`.
    Bool,
    /// One of the listed strings.
    OneOf(Vec<String>),
}

impl OptionDomain {
    /// Parse `raw` into a value belonging to this domain.
    ///
    /// Booleans are accepted case-insensitively, so `True` and `false` are
    /// both valid.
    fn parse(&self, name: &str, raw: &str) -> Result<OptionValue, OptionError> {
        let invalid = || OptionError::InvalidValue {
            name: name.to_owned(),
            value: raw.to_owned(),
            expected: self.describe(),
        };
        match self {
            Self::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" => Ok(OptionValue::Bool(true)),
                "false" => Ok(OptionValue::Bool(false)),
                _ => Err(invalid()),
            },
            Self::OneOf(values) => values
                .iter()
                .find(|v| v.as_str() == raw)
                .map(|v| OptionValue::Text(v.clone()))
                .ok_or_else(invalid),
        }
    }

    fn contains(&self, value: &OptionValue) -> bool {
        match (self, value) {
            (Self::Bool, OptionValue::Bool(_)) => true,
            (Self::OneOf(values), OptionValue::Text(text)) => values.contains(text),
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Bool => "true, false".to_owned(),
            Self::OneOf(values) => values.join(", "),
        }
    }
}

/// Option declaration as written in a recipe.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OptionSpec {
    /// Value used when no override is given.
    pub default: OptionValue,
    /// Accepted values for string options.
    #[serde(default)]
    pub values: Option<Vec<String>>,
    /// CMake cache variable receiving the value.
    #[serde(default)]
    pub define: Option<String>,
}

/// A validated option declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl {
    name: String,
    domain: OptionDomain,
    default: OptionValue,
    define: Option<String>,
}

impl OptionDecl {
    /// Validate a recipe declaration.
    ///
    /// # Errors
    ///
    /// Returns [`OptionError::InvalidDeclaration`] when a string option lacks
    /// a value list, a boolean option declares one, or the default lies
    /// outside the domain.
    pub fn from_spec(name: &str, spec: OptionSpec) -> Result<Self, OptionError> {
        let invalid = |reason: &str| OptionError::InvalidDeclaration {
            name: name.to_owned(),
            reason: reason.to_owned(),
        };
        let domain = match (&spec.default, spec.values) {
            (OptionValue::Bool(_), None) => OptionDomain::Bool,
            (OptionValue::Bool(_), Some(_)) => {
                return Err(invalid("boolean options must not list values"));
            }
            (OptionValue::Text(_), None) => {
                return Err(invalid("string options must list their accepted values"));
            }
            (OptionValue::Text(_), Some(values)) if values.is_empty() => {
                return Err(invalid("value list must not be empty"));
            }
            (OptionValue::Text(_), Some(values)) => OptionDomain::OneOf(values),
        };
        if !domain.contains(&spec.default) {
            return Err(invalid("default is not one of the listed values"));
        }
        Ok(Self {
            name: name.to_owned(),
            domain,
            default: spec.default,
            define: spec.define,
        })
    }

    /// Convenience constructor for a boolean option.
    #[must_use]
    pub fn boolean(name: &str, default: bool, define: Option<&str>) -> Self {
        Self {
            name: name.to_owned(),
            domain: OptionDomain::Bool,
            default: OptionValue::Bool(default),
            define: define.map(str::to_owned),
        }
    }

    /// Option name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accepted values.
    #[must_use]
    pub const fn domain(&self) -> &OptionDomain {
        &self.domain
    }

    /// Declared default.
    #[must_use]
    pub const fn default_value(&self) -> &OptionValue {
        &self.default
    }

    /// CMake cache variable receiving this option, if any.
    #[must_use]
    pub fn define(&self) -> Option<&str> {
        self.define.as_deref()
    }

    /// Whether `value` lies in this option's domain.
    #[must_use]
    pub fn accepts(&self, value: &OptionValue) -> bool {
        self.domain.contains(value)
    }

    /// Human-readable list of accepted values.
    #[must_use]
    pub fn describe_domain(&self) -> String {
        self.domain.describe()
    }
}

/// A `name=value` override as typed on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionOverride {
    /// Option name.
    pub name: String,
    /// Unvalidated value.
    pub value: String,
}

impl FromStr for OptionOverride {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || OptionError::MalformedOverride {
            input: s.to_owned(),
        };
        let (name, value) = s.split_once('=').ok_or_else(malformed)?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return Err(malformed());
        }
        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Effective option values for one invocation.
///
/// Every declared option is present; undeclared names never are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BuildOptions {
    values: BTreeMap<String, OptionValue>,
}

impl BuildOptions {
    /// Apply `overrides` on top of the declared defaults.
    ///
    /// Later overrides of the same option win.
    ///
    /// # Errors
    ///
    /// Returns [`OptionError::UnknownOption`] for undeclared names and
    /// [`OptionError::InvalidValue`] for values outside the domain.
    ///
    /// # Examples
    ///
    /// ```
    /// use lightning_packager::options::{BuildOptions, OptionDecl, OptionOverride};
    ///
    /// let decls = [OptionDecl::boolean("shared", false, Some("BUILD_SHARED_LIBS"))];
    /// let overrides: Vec<OptionOverride> = vec!["shared=True".parse()?];
    /// let options = BuildOptions::resolve(&decls, &overrides)?;
    /// assert!(options.flag("shared"));
    /// # Ok::<(), lightning_packager::options::OptionError>(())
    /// ```
    pub fn resolve(
        decls: &[OptionDecl],
        overrides: &[OptionOverride],
    ) -> Result<Self, OptionError> {
        let mut values: BTreeMap<String, OptionValue> = decls
            .iter()
            .map(|decl| (decl.name.clone(), decl.default.clone()))
            .collect();

        for item in overrides {
            let decl = decls
                .iter()
                .find(|decl| decl.name == item.name)
                .ok_or_else(|| OptionError::UnknownOption {
                    name: item.name.clone(),
                    declared: decls
                        .iter()
                        .map(OptionDecl::name)
                        .collect::<Vec<_>>()
                        .join(", "),
                })?;
            let value = decl.domain.parse(&decl.name, &item.value)?;
            values.insert(decl.name.clone(), value);
        }

        Ok(Self { values })
    }

    /// Look up an option's effective value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Return `true` when `name` is a boolean option set to `true`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(OptionValue::Bool(true)))
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
