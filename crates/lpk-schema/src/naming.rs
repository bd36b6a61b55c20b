//! Artifact naming.
//!
//! Archive file names are derived deterministically from a logical resource
//! name plus a fixed suffix, optionally prefixed with a stack/stage label:
//! `[prefix-]<name>-lambda.zip` and `[prefix-]<name>-requirements.zip`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating a resource name.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NameError {
    /// The name was empty.
    #[error("resource name must not be empty")]
    Empty,

    /// The name contained a character outside `[A-Za-z0-9._-]`.
    #[error("invalid character {ch:?} in resource name '{name}'")]
    InvalidChar {
        /// The rejected name.
        name: String,
        /// The first offending character.
        ch: char,
    },
}

/// Logical name of a packaged function; the stem of every artifact file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName(String);

impl ResourceName {
    /// Create a validated resource name.
    ///
    /// # Errors
    ///
    /// Returns [`NameError`] if `name` is empty or contains characters that
    /// are not safe in a file name on every platform.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        if name.is_empty() {
            return Err(NameError::Empty);
        }
        if let Some(ch) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(NameError::InvalidChar { name, ch });
        }
        Ok(Self(name))
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the given artifact for this resource.
    ///
    /// # Example
    ///
    /// ```
    /// use lpk_schema::{ArtifactKind, ResourceName};
    ///
    /// let name = ResourceName::new("api").unwrap();
    /// assert_eq!(name.file_name(ArtifactKind::Code, None), "api-lambda.zip");
    /// assert_eq!(
    ///     name.file_name(ArtifactKind::Layer, Some("prod")),
    ///     "prod-api-requirements.zip"
    /// );
    /// ```
    pub fn file_name(&self, kind: ArtifactKind, prefix: Option<&str>) -> String {
        match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{prefix}-{}-{}", self.0, kind.suffix()),
            None => format!("{}-{}", self.0, kind.suffix()),
        }
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceName {
    type Error = NameError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ResourceName> for String {
    fn from(name: ResourceName) -> Self {
        name.0
    }
}

/// The two archive artifacts a build can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The function's own code archive (possibly merged with dependencies).
    Code,
    /// The dependency-only layer archive.
    Layer,
}

impl ArtifactKind {
    /// Fixed file-name suffix for this artifact.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Code => "lambda.zip",
            Self::Layer => "requirements.zip",
        }
    }
}
