//! Package identity metadata and pass-through dependency declarations.
//!
//! A [`PackageDescriptor`] is loaded once from the recipe and never mutated.
//! [`Requirement`] values are parsed for shape only; the packager never
//! resolves them and simply records them in the package manifest.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors arising from invalid descriptor metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A required descriptor field is empty.
    #[error("package {field} must not be empty")]
    EmptyField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// A descriptor field contains characters that cannot appear in a path.
    #[error("package {field} \"{value}\" contains whitespace or path separators")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A requirement reference is malformed.
    #[error("invalid requirement \"{value}\": expected name/version[@user/channel]")]
    InvalidRequirement {
        /// The rejected reference.
        value: String,
    },
}

/// Identifying metadata for the package being produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDescriptor {
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// License identifier.
    pub license: String,
    /// Project home page or origin URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Dependencies declared for the external resolver.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Requirement>,
}

impl PackageDescriptor {
    /// Check that name and version are usable as directory components.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError`] when name, version, or license is empty,
    /// or when name or version contain whitespace or path separators.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        for (field, value) in [("name", &self.name), ("version", &self.version)] {
            if value.is_empty() {
                return Err(DescriptorError::EmptyField { field });
            }
            if value
                .chars()
                .any(|c| c.is_whitespace() || c == '/' || c == '\\')
            {
                return Err(DescriptorError::InvalidField {
                    field,
                    value: value.clone(),
                });
            }
        }
        if self.license.trim().is_empty() {
            return Err(DescriptorError::EmptyField { field: "license" });
        }
        Ok(())
    }

    /// Return `name-version`, used to name per-package work directories.
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

/// A pinned dependency reference such as `asio/1.11.0@bincrafters/stable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Requirement {
    name: String,
    version: String,
    origin: Option<(String, String)>,
}

impl Requirement {
    /// Dependency name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pinned version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The `(user, channel)` pair the dependency is published under.
    #[must_use]
    pub fn origin(&self) -> Option<(&str, &str)> {
        self.origin
            .as_ref()
            .map(|(user, channel)| (user.as_str(), channel.as_str()))
    }
}

fn non_empty_pair<'a>(value: &'a str, sep: char) -> Option<(&'a str, &'a str)> {
    let (left, right) = value.split_once(sep)?;
    let valid = |part: &str| {
        !part.is_empty() && !part.contains(['/', '@']) && !part.contains(char::is_whitespace)
    };
    (valid(left) && valid(right)).then_some((left, right))
}

impl TryFrom<&str> for Requirement {
    type Error = DescriptorError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let invalid = || DescriptorError::InvalidRequirement {
            value: value.to_owned(),
        };
        let (reference, origin) = match value.split_once('@') {
            Some((reference, origin)) => (reference, Some(origin)),
            None => (value, None),
        };
        let (name, version) = non_empty_pair(reference, '/').ok_or_else(invalid)?;
        let origin = match origin {
            Some(origin) => {
                let (user, channel) = non_empty_pair(origin, '/').ok_or_else(invalid)?;
                Some((user.to_owned(), channel.to_owned()))
            }
            None => None,
        };
        Ok(Self {
            name: name.to_owned(),
            version: version.to_owned(),
            origin,
        })
    }
}

impl TryFrom<String> for Requirement {
    type Error = DescriptorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Requirement> for String {
    fn from(value: Requirement) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if let Some((user, channel)) = &self.origin {
            write!(f, "@{user}/{channel}")?;
        }
        Ok(())
    }
}
