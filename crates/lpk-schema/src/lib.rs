//! Shared types for lpk.
//!
//! Everything here is pure data: the archive [`Fingerprint`], the
//! [`PackageConfig`] schema read from `lpk.toml`, and the naming rules for
//! the artifacts written into the staging directory.

pub mod config;
pub mod hash;
pub mod naming;

// Re-exports
pub use config::{ConfigError, PackageConfig};
pub use hash::Fingerprint;
pub use naming::{ArtifactKind, NameError, ResourceName};

/// File name of the optional project configuration, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "lpk.toml";

/// The catch-all glob pattern: matches every path in the tree, recursively.
pub const CATCH_ALL: &str = "**";
