//! Dependency installers.
//!
//! The archive builder only needs one promise: after
//! `install(manifest, target_dir)` returns `Ok`, `target_dir` holds exactly
//! the files to package as dependencies. How they get there is up to the
//! [`Installer`]:
//!
//! - [`PipInstaller`] runs `pip install --target` on the host;
//! - [`ContainerInstaller`] runs the same inside a container matching the
//!   function runtime, so native wheels are built for the right platform;
//! - [`NoopInstaller`] trusts that the caller already materialized them.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;
use tracing::{debug, info};

/// Lines of installer stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 20;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("executable not found: {0}")]
    NotFound(String),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}:\n{stderr}", .code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{} must be inside {}", .target.display(), .mount.display())]
    Layout { target: PathBuf, mount: PathBuf },
}

/// Materializes the dependencies listed in a manifest into a directory.
pub trait Installer: std::fmt::Debug {
    /// Install everything in `manifest` into `target_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the installer cannot be started or reports
    /// failure. A failure must never be swallowed: an empty `target_dir`
    /// would still produce a valid-looking archive.
    fn install(&self, manifest: &Path, target_dir: &Path) -> Result<(), InstallError>;
}

impl<T: Installer + ?Sized> Installer for &T {
    fn install(&self, manifest: &Path, target_dir: &Path) -> Result<(), InstallError> {
        (**self).install(manifest, target_dir)
    }
}

/// Leaves `target_dir` as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstaller;

impl Installer for NoopInstaller {
    fn install(&self, _manifest: &Path, _target_dir: &Path) -> Result<(), InstallError> {
        Ok(())
    }
}

/// `python -m pip install -r <manifest> --target=<dir>` on the host.
#[derive(Debug, Clone, Default)]
pub struct PipInstaller {
    python: Option<PathBuf>,
}

impl PipInstaller {
    /// Installer using the first `python3` (or `python`) on `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installer using a specific interpreter.
    pub fn with_python(python: impl Into<PathBuf>) -> Self {
        Self {
            python: Some(python.into()),
        }
    }

    fn python(&self) -> Result<PathBuf, InstallError> {
        if let Some(python) = &self.python {
            return Ok(python.clone());
        }
        which::which("python3")
            .or_else(|_| which::which("python"))
            .map_err(|_| InstallError::NotFound("python3".to_string()))
    }

    /// The command that would be run, without running it.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::NotFound`] when no interpreter is available.
    pub fn command(&self, manifest: &Path, target_dir: &Path) -> Result<Command, InstallError> {
        let mut cmd = Command::new(self.python()?);
        cmd.args(["-m", "pip", "install", "-r"])
            .arg(manifest)
            .arg(format!("--target={}", target_dir.display()));
        Ok(cmd)
    }
}

impl Installer for PipInstaller {
    fn install(&self, manifest: &Path, target_dir: &Path) -> Result<(), InstallError> {
        info!(target = %target_dir.display(), "installing dependencies with pip");
        run(self.command(manifest, target_dir)?)
    }
}

/// `pip install` inside a container.
///
/// The manifest's directory is bind-mounted at `mount`; `target_dir` must be
/// inside it so the installed files land back on the host.
#[derive(Debug, Clone)]
pub struct ContainerInstaller {
    image: String,
    mount: String,
    engine: String,
}

impl ContainerInstaller {
    /// Installer running `image` with the staging directory mounted at `mount`.
    pub fn new(image: impl Into<String>, mount: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            mount: mount.into(),
            engine: "docker".to_string(),
        }
    }

    /// Use another Docker-compatible CLI (e.g. `podman`).
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Shell script run inside the container.
    fn script(&self, manifest_name: &str, target_rel: &str) -> String {
        format!(
            "cd {}; pip install -r {manifest_name} -t {target_rel}",
            self.mount
        )
    }

    /// The command that would be run, without running it.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Layout`] when `target_dir` is not inside the
    /// manifest's directory, and [`InstallError::NotFound`] when the
    /// container engine is not on `PATH`.
    pub fn command(&self, manifest: &Path, target_dir: &Path) -> Result<Command, InstallError> {
        let host_dir = manifest.parent().unwrap_or_else(|| Path::new("."));
        let layout_error = || InstallError::Layout {
            target: target_dir.to_path_buf(),
            mount: host_dir.to_path_buf(),
        };
        let target_rel = target_dir.strip_prefix(host_dir).map_err(|_| layout_error())?;
        let target_rel = crate::select::relative_key(target_rel);
        if target_rel.is_empty() {
            return Err(layout_error());
        }
        let manifest_name = manifest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(layout_error)?;

        let engine = which::which(&self.engine)
            .map_err(|_| InstallError::NotFound(self.engine.clone()))?;
        let mut cmd = Command::new(engine);
        cmd.args(["run", "--rm", "-v"])
            .arg(format!("{}:{}", host_dir.display(), self.mount))
            .arg(&self.image)
            .args(["bash", "-c"])
            .arg(self.script(&manifest_name, &target_rel));
        Ok(cmd)
    }
}

impl Installer for ContainerInstaller {
    fn install(&self, manifest: &Path, target_dir: &Path) -> Result<(), InstallError> {
        info!(image = %self.image, "installing dependencies in container");
        run(self.command(manifest, target_dir)?)
    }
}

/// Run `cmd` to completion, turning a non-zero exit into [`InstallError::Failed`].
fn run(mut cmd: Command) -> Result<(), InstallError> {
    let program = cmd.get_program().to_string_lossy().to_string();
    debug!(command = ?cmd, "running installer");

    let Output {
        status,
        stdout,
        stderr,
    } = cmd.output().map_err(|source| InstallError::Spawn {
        program: program.clone(),
        source,
    })?;

    debug!(stdout = %String::from_utf8_lossy(&stdout), "installer output");
    if status.success() {
        return Ok(());
    }

    Err(InstallError::Failed {
        program,
        code: status.code(),
        stderr: tail(&String::from_utf8_lossy(&stderr), STDERR_TAIL_LINES),
    })
}

/// Last `n` lines of `text`.
fn tail(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
