//! Archive build orchestration.
//!
//! Composes [`select`](crate::select::select) and the
//! [`ArchiveWriter`] into the two artifacts a function needs:
//!
//! - **merged** (`layer = false`): one code archive holding the selected
//!   project files followed by every installed dependency;
//! - **layered** (`layer = true`): a code archive with project files only,
//!   plus an independent layer archive with only the dependencies.
//!
//! ```text
//! NotStarted -> DependenciesStaged -> CodeArchiveWritten -+-> DependenciesMerged  -> Done
//!                                                         +-> LayerArchiveWritten -> Done
//! ```
//!
//! Every build starts over from `NotStarted` and overwrites earlier
//! artifacts; nothing is patched in place.
//!
//! In merged mode a dependency file whose archive name is already taken by
//! a project file is left out: the project file wins.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveWriter, WriteMode, is_allowed};
use crate::error::PackError;
use crate::select::{SelectedFileSet, relative_key, select_skipping, walk};
use crate::staging::StagingLayout;

/// What to package for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Absolute project root; every pattern is relative to it.
    pub project_root: PathBuf,
    pub include: Vec<String>,
    /// Caller excludes plus the enforced staging-directory exclusion.
    pub exclude: Vec<String>,
    /// Materialized dependency files.
    pub dependency_dir: PathBuf,
    /// Staging directory; never packaged into the code archive.
    pub staging_dir: PathBuf,
}

impl PackageSpec {
    /// Build a spec whose excludes always cover `layout`'s staging directory.
    pub fn new(layout: &StagingLayout, include: Vec<String>, mut exclude: Vec<String>) -> Self {
        if let Some(staging) = layout.exclude_pattern() {
            if !exclude.contains(&staging) {
                exclude.push(staging);
            }
        }
        Self {
            project_root: layout.project_root().to_path_buf(),
            include,
            exclude,
            dependency_dir: layout.install_dir().to_path_buf(),
            staging_dir: layout.staging_dir().to_path_buf(),
        }
    }

    /// Resolve the include/exclude patterns into the set of project paths to package.
    ///
    /// The staging directory is never walked, and anything under it is
    /// dropped even if an include pattern names it explicitly.
    ///
    /// # Errors
    ///
    /// Propagates selection errors (malformed patterns, unreadable tree).
    pub fn select(&self) -> Result<SelectedFileSet, PackError> {
        let mut selected = select_skipping(
            &self.include,
            &self.exclude,
            &self.project_root,
            std::slice::from_ref(&self.staging_dir),
        )?;
        selected.retain(|path| !path.starts_with(&self.staging_dir));
        Ok(selected)
    }
}

/// Progress of a single build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    NotStarted,
    DependenciesStaged,
    CodeArchiveWritten,
    DependenciesMerged,
    LayerArchiveWritten,
    Done,
}

/// Paths of the archives produced by a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutput {
    pub code_archive: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_archive: Option<PathBuf>,
}

/// Builds the code archive and, in layer mode, the layer archive.
#[derive(Debug)]
pub struct ArchiveBuilder<'a> {
    spec: &'a PackageSpec,
    code_archive: PathBuf,
    layer_archive: PathBuf,
    writer: ArchiveWriter,
    state: BuildState,
}

impl<'a> ArchiveBuilder<'a> {
    pub fn new(spec: &'a PackageSpec, code_archive: &Path, layer_archive: &Path) -> Self {
        Self {
            spec,
            code_archive: code_archive.to_path_buf(),
            layer_archive: layer_archive.to_path_buf(),
            writer: ArchiveWriter::new(),
            state: BuildState::NotStarted,
        }
    }

    /// Builder writing to `layout`'s archive paths.
    pub fn for_layout(spec: &'a PackageSpec, layout: &StagingLayout) -> Self {
        Self::new(spec, layout.code_archive(), layout.layer_archive())
    }

    /// Replace the archive writer (e.g. to use a different fixed timestamp).
    pub fn with_writer(mut self, writer: ArchiveWriter) -> Self {
        self.writer = writer;
        self
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    fn advance(&mut self, next: BuildState) {
        debug!(from = ?self.state, to = ?next, "build state");
        self.state = next;
    }

    /// Run the build.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::MissingDependencyDir`] when the dependency
    /// directory does not exist (an existing empty one is fine), and
    /// propagates selection and archive errors.
    pub fn build(&mut self, layer: bool) -> Result<BuildOutput, PackError> {
        self.state = BuildState::NotStarted;
        let spec = self.spec;
        let writer = self.writer;
        let code_path = self.code_archive.clone();
        let layer_path = self.layer_archive.clone();

        let dependency_dir = &spec.dependency_dir;
        if !dependency_dir.is_dir() {
            return Err(PackError::MissingDependencyDir(dependency_dir.clone()));
        }
        self.advance(BuildState::DependenciesStaged);

        let project_files = spec.select()?;
        let mut dependencies = dependency_files(dependency_dir)?;
        let project_names: HashSet<String> = project_files
            .iter()
            .filter(|path| path.is_file() && is_allowed(path))
            .filter_map(|path| path.strip_prefix(&spec.project_root).ok())
            .map(relative_key)
            .collect();
        info!(
            files = project_files.len(),
            dependencies = dependencies.len(),
            layer,
            "packaging"
        );

        let code_archive = writer.write(
            &code_path,
            project_files,
            &spec.project_root,
            WriteMode::Create,
            is_allowed,
        )?;
        self.advance(BuildState::CodeArchiveWritten);

        let layer_archive = if layer {
            let layer_archive = writer.write(
                &layer_path,
                dependencies,
                dependency_dir,
                WriteMode::Create,
                is_allowed,
            )?;
            self.advance(BuildState::LayerArchiveWritten);
            Some(layer_archive.to_path_buf())
        } else {
            dependencies.retain(|dep| {
                let Ok(relative) = dep.strip_prefix(dependency_dir) else {
                    return true;
                };
                let name = relative_key(relative);
                if dep.is_file() && project_names.contains(&name) {
                    warn!(entry = %name, "dependency shadowed by project file; keeping the project file");
                    return false;
                }
                true
            });
            writer.write(
                code_archive,
                dependencies,
                dependency_dir,
                WriteMode::Append,
                is_allowed,
            )?;
            self.advance(BuildState::DependenciesMerged);
            None
        };

        self.advance(BuildState::Done);
        Ok(BuildOutput {
            code_archive: code_archive.to_path_buf(),
            layer_archive,
        })
    }
}

/// Every path below `dir`, hidden entries included.
fn dependency_files(dir: &Path) -> Result<Vec<PathBuf>, PackError> {
    walk(dir, |_| false)
}
