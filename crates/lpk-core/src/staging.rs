//! On-disk layout of a build.
//!
//! ```text
//! <project_root>/
//! └── <staging_dir>/                     # default: dist/
//!     ├── requirements.txt               # filtered dependency manifest
//!     ├── <install_folder>/              # default: requirements/
//!     ├── [prefix-]<name>-lambda.zip
//!     └── [prefix-]<name>-requirements.zip
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use lpk_schema::{ArtifactKind, PackageConfig, ResourceName};
use tracing::debug;

use crate::error::{PackError, Phase};
use crate::select::relative_key;

/// Resolved absolute paths for one resource's build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    project_root: PathBuf,
    staging_dir: PathBuf,
    install_dir: PathBuf,
    code_archive: PathBuf,
    layer_archive: PathBuf,
}

impl StagingLayout {
    pub fn new(project_root: &Path, name: &ResourceName, config: &PackageConfig) -> Self {
        let staging_dir = project_root.join(&config.staging_dir);
        let prefix = config.prefix.as_deref();
        Self {
            project_root: project_root.to_path_buf(),
            install_dir: staging_dir.join(&config.install_folder),
            code_archive: staging_dir.join(name.file_name(ArtifactKind::Code, prefix)),
            layer_archive: staging_dir.join(name.file_name(ArtifactKind::Layer, prefix)),
            staging_dir,
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Where dependencies are installed before packaging.
    pub fn install_dir(&self) -> &Path {
        &self.install_dir
    }

    /// Filtered copy of the dependency manifest handed to the installer.
    pub fn manifest_path(&self) -> PathBuf {
        self.staging_dir.join("requirements.txt")
    }

    pub fn code_archive(&self) -> &Path {
        &self.code_archive
    }

    pub fn layer_archive(&self) -> &Path {
        &self.layer_archive
    }

    /// Exclude pattern covering the staging directory, or `None` when the
    /// staging directory lives outside the project root.
    pub fn exclude_pattern(&self) -> Option<String> {
        let relative = self.staging_dir.strip_prefix(&self.project_root).ok()?;
        let relative = relative_key(relative);
        if relative.is_empty() {
            return None;
        }
        Some(format!("{relative}/**"))
    }

    /// Create the staging directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn prepare(&self) -> Result<(), PackError> {
        fs::create_dir_all(&self.staging_dir).map_err(|e| {
            PackError::io(Phase::DependencyStaging, self.staging_dir.display(), e)
        })
    }

    /// Empty (or create) the install folder so no stale dependency survives
    /// into the next archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be removed or recreated.
    pub fn reset_install_dir(&self) -> Result<(), PackError> {
        let err = |e| PackError::io(Phase::DependencyStaging, self.install_dir.display(), e);
        if self.install_dir.exists() {
            debug!(dir = %self.install_dir.display(), "clearing install folder");
            fs::remove_dir_all(&self.install_dir).map_err(err)?;
        }
        fs::create_dir_all(&self.install_dir).map_err(err)
    }
}
