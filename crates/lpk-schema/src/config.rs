//! `lpk.toml` configuration schema.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration that packages the whole project root.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be deserialized into a valid configuration.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Packaging options for one function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// Dependency manifest, relative to the project root.
    pub requirements_path: PathBuf,
    /// Target runtime identifier (selects the build image tag when dockerized).
    pub runtime: String,
    /// Package dependencies into a separate layer archive.
    pub layer: bool,
    /// Install dependencies inside a container matching the target runtime.
    pub dockerize: bool,
    /// Glob patterns of project files to package.
    pub include: Vec<String>,
    /// Glob patterns of project files to leave out.
    pub exclude: Vec<String>,
    /// Dependencies listed in the manifest that must not be deployed.
    pub no_deploy: Vec<String>,
    /// Staging directory, relative to the project root.
    pub staging_dir: PathBuf,
    /// Dependency install folder, relative to the staging directory.
    pub install_folder: PathBuf,
    /// Container image used for isolated installs.
    pub docker_image: String,
    /// Mount point of the staging directory inside the container.
    pub container_path: String,
    /// Optional stack/stage label prepended to artifact file names.
    pub prefix: Option<String>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            requirements_path: PathBuf::from("requirements.txt"),
            runtime: "python3.8".to_string(),
            layer: false,
            dockerize: false,
            include: vec![crate::CATCH_ALL.to_string()],
            exclude: Vec::new(),
            no_deploy: Vec::new(),
            staging_dir: PathBuf::from("dist"),
            install_folder: PathBuf::from("requirements"),
            docker_image: "lambci/lambda".to_string(),
            container_path: "/io".to_string(),
            prefix: None,
        }
    }
}

impl PackageConfig {
    /// Parse a configuration from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, or
    /// `ConfigError::Parse` if the TOML content is invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the TOML content is invalid or contains
    /// unknown keys.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `lpk.toml` from `project_root`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join(crate::CONFIG_FILE_NAME);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Dependency install folder relative to the project root
    /// (`<staging_dir>/<install_folder>`).
    pub fn install_dir(&self) -> PathBuf {
        self.staging_dir.join(&self.install_folder)
    }

    /// Container image reference for isolated installs.
    ///
    /// A `build-<runtime>` tag is appended when the configured image has none.
    pub fn image_ref(&self) -> String {
        let name = self.docker_image.rsplit('/').next().unwrap_or_default();
        if name.contains(':') {
            self.docker_image.clone()
        } else {
            format!("{}:build-{}", self.docker_image, self.runtime)
        }
    }
}
