//! Domain-specific errors for packaging operations.
//!
//! Every variant maps to the [`Phase`] it was raised in, and the phase is
//! part of the rendered message. A broken archive looks exactly like a good
//! one until it is deployed, so "which step failed" is the first thing a
//! user needs to see.

use std::path::PathBuf;

use lpk_schema::{ConfigError, NameError};
use thiserror::Error;

use crate::install::InstallError;

/// The build step an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Loading and validating caller configuration.
    Configuration,
    /// Walking the project tree.
    Selection,
    /// Filtering the manifest and materializing dependencies.
    DependencyStaging,
    /// Writing code or layer archives.
    ArchiveWrite,
    /// Hashing produced archives.
    Fingerprint,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Configuration => "configuration",
            Self::Selection => "selection",
            Self::DependencyStaging => "dependency staging",
            Self::ArchiveWrite => "archive write",
            Self::Fingerprint => "fingerprint",
        })
    }
}

#[derive(Error, Debug)]
pub enum PackError {
    #[error("configuration failed: {0}")]
    Config(#[from] ConfigError),

    #[error("configuration failed: {0}")]
    Name(#[from] NameError),

    #[error("configuration failed: dependency manifest not found: {}", .0.display())]
    MissingManifest(PathBuf),

    #[error("configuration failed: dependency directory not found: {}", .0.display())]
    MissingDependencyDir(PathBuf),

    #[error("configuration failed: invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("selection failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("dependency staging failed: {0}")]
    Install(#[from] InstallError),

    #[error("archive write failed: {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive write failed: {} is not under {}", .path.display(), .base.display())]
    OutsideBase { path: PathBuf, base: PathBuf },

    #[error("archive write failed: invalid fixed timestamp {0}")]
    Timestamp(String),

    #[error("{phase} failed: {context}: {source}")]
    Io {
        phase: Phase,
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PackError {
    /// Wrap an I/O error with the phase and a short description of what was
    /// being attempted.
    pub fn io(phase: Phase, context: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            phase,
            context: context.to_string(),
            source,
        }
    }

    /// The build step this error was raised in.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Config(_)
            | Self::Name(_)
            | Self::MissingManifest(_)
            | Self::MissingDependencyDir(_)
            | Self::Pattern { .. } => Phase::Configuration,
            Self::Walk(_) => Phase::Selection,
            Self::Install(_) => Phase::DependencyStaging,
            Self::Archive { .. } | Self::OutsideBase { .. } | Self::Timestamp(_) => {
                Phase::ArchiveWrite
            }
            Self::Io { phase, .. } => *phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_the_phase() {
        let err = PackError::MissingDependencyDir(PathBuf::from("/p/dist/requirements"));
        assert_eq!(err.phase(), Phase::Configuration);
        assert!(err.to_string().starts_with("configuration failed"));

        let err = PackError::io(
            Phase::ArchiveWrite,
            "creating /p/dist/api-lambda.zip",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.phase(), Phase::ArchiveWrite);
        assert!(err.to_string().starts_with("archive write failed: creating"));
    }

    #[test]
    fn malformed_pattern_is_configuration_error() {
        let source = glob::Pattern::new("[").unwrap_err();
        let err = PackError::Pattern {
            pattern: "[".to_string(),
            source,
        };
        assert_eq!(err.phase(), Phase::Configuration);
    }
}
