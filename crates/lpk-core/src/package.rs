//! End-to-end packaging of one function.

use std::path::{Path, PathBuf};

use lpk_schema::{Fingerprint, PackageConfig, ResourceName};
use serde::Serialize;
use tracing::info;

use crate::builder::{ArchiveBuilder, PackageSpec};
use crate::error::{PackError, Phase};
use crate::install::{ContainerInstaller, Installer, PipInstaller};
use crate::requirements::RequirementsManifest;
use crate::staging::StagingLayout;

/// Where a build's dependencies come from.
#[derive(Debug, Clone, Copy)]
pub enum DependencySource<'a> {
    /// Filter the project manifest and run this installer into a freshly
    /// cleared install folder.
    Install(&'a dyn Installer),
    /// Package the install folder as it already is.
    Prestaged,
}

/// Archive paths and fingerprints handed to the deployment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageOutputs {
    pub package_archive: PathBuf,
    pub package_hash: Fingerprint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_archive: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_hash: Option<Fingerprint>,
}

/// The installer `config` asks for: a container build when `dockerize` is
/// set, host pip otherwise.
pub fn installer_for(config: &PackageConfig) -> Box<dyn Installer> {
    if config.dockerize {
        Box::new(ContainerInstaller::new(
            config.image_ref(),
            config.container_path.clone(),
        ))
    } else {
        Box::new(PipInstaller::new())
    }
}

/// Fingerprint an archive on disk.
///
/// # Errors
///
/// Returns a fingerprint-phase error if the file cannot be read.
pub fn fingerprint(path: &Path) -> Result<Fingerprint, PackError> {
    Fingerprint::compute_file(path).map_err(|e| PackError::io(Phase::Fingerprint, path.display(), e))
}

/// Stage dependencies, build the archives and fingerprint them.
///
/// # Errors
///
/// Returns the first error of whichever phase fails; nothing after it runs.
pub fn package(
    name: &ResourceName,
    project_root: &Path,
    config: &PackageConfig,
    deps: DependencySource<'_>,
) -> Result<PackageOutputs, PackError> {
    let root = project_root
        .canonicalize()
        .map_err(|e| PackError::io(Phase::Configuration, project_root.display(), e))?;
    let layout = StagingLayout::new(&root, name, config);
    info!(name = %name, root = %root.display(), layer = config.layer, "packaging function");

    if let DependencySource::Install(installer) = deps {
        let manifest = RequirementsManifest::from_file(&root.join(&config.requirements_path))?
            .without(&config.no_deploy);
        layout.prepare()?;
        manifest.write_to(&layout.manifest_path())?;
        layout.reset_install_dir()?;
        installer.install(&layout.manifest_path(), layout.install_dir())?;
    }

    let spec = PackageSpec::new(&layout, config.include.clone(), config.exclude.clone());
    let output = ArchiveBuilder::for_layout(&spec, &layout).build(config.layer)?;

    let package_hash = fingerprint(&output.code_archive)?;
    let layer_hash = output.layer_archive.as_deref().map(fingerprint).transpose()?;
    info!(archive = %output.code_archive.display(), hash = %package_hash, "package ready");

    Ok(PackageOutputs {
        package_archive: output.code_archive,
        package_hash,
        layer_archive: output.layer_archive,
        layer_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::{InstallError, NoopInstaller};
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    /// Records what it was asked to install and drops one package in place.
    #[derive(Debug, Default)]
    struct FakeInstaller {
        manifest: RefCell<Option<String>>,
    }

    impl Installer for FakeInstaller {
        fn install(&self, manifest: &Path, target_dir: &Path) -> Result<(), InstallError> {
            *self.manifest.borrow_mut() = Some(fs::read_to_string(manifest).unwrap());
            fs::create_dir_all(target_dir.join("requests")).unwrap();
            fs::write(target_dir.join("requests/__init__.py"), "").unwrap();
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FailingInstaller;

    impl Installer for FailingInstaller {
        fn install(&self, _: &Path, _: &Path) -> Result<(), InstallError> {
            Err(InstallError::Failed {
                program: "pip".to_string(),
                code: Some(1),
                stderr: "boom".to_string(),
            })
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("handler.py"), "def handler(e, c): pass\n").unwrap();
        fs::write(dir.path().join("requirements.txt"), "requests==2.31\npylint\n").unwrap();
        dir
    }

    fn name() -> ResourceName {
        ResourceName::new("api").unwrap()
    }

    fn entries(archive: &Path) -> Vec<String> {
        let zip = zip::ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn test_package_filters_manifest_and_installs() {
        let dir = project();
        let config = PackageConfig {
            no_deploy: vec!["pylint".to_string()],
            ..PackageConfig::default()
        };
        let installer = FakeInstaller::default();

        let out = package(&name(), dir.path(), &config, DependencySource::Install(&installer))
            .unwrap();

        assert_eq!(installer.manifest.borrow().as_deref(), Some("requests==2.31\n"));
        assert!(out.package_archive.ends_with("dist/api-lambda.zip"));
        assert_eq!(
            entries(&out.package_archive),
            vec!["handler.py", "requests/__init__.py", "requirements.txt"]
        );
        assert_eq!(out.package_hash, fingerprint(&out.package_archive).unwrap());
        assert_eq!(out.layer_archive, None);
        assert_eq!(out.layer_hash, None);
    }

    #[test]
    fn test_package_layer_mode() {
        let dir = project();
        let config = PackageConfig {
            layer: true,
            ..PackageConfig::default()
        };
        let out = package(
            &name(),
            dir.path(),
            &config,
            DependencySource::Install(&FakeInstaller::default()),
        )
        .unwrap();

        let layer = out.layer_archive.as_deref().unwrap();
        assert!(layer.ends_with("dist/api-requirements.zip"));
        assert_eq!(entries(layer), vec!["requests/__init__.py"]);
        assert_eq!(out.layer_hash, Some(fingerprint(layer).unwrap()));
        assert_eq!(
            entries(&out.package_archive),
            vec!["handler.py", "requirements.txt"]
        );
    }

    #[test]
    fn test_missing_manifest_stops_before_install() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("handler.py"), "").unwrap();
        let err = package(
            &name(),
            dir.path(),
            &PackageConfig::default(),
            DependencySource::Install(&FailingInstaller),
        )
        .unwrap_err();
        assert!(matches!(err, PackError::MissingManifest(_)));
        assert_eq!(err.phase(), Phase::Configuration);
    }

    #[test]
    fn test_installer_failure_is_surfaced() {
        let dir = project();
        let err = package(
            &name(),
            dir.path(),
            &PackageConfig::default(),
            DependencySource::Install(&FailingInstaller),
        )
        .unwrap_err();
        assert_eq!(err.phase(), Phase::DependencyStaging);
        assert!(!dir.path().join("dist/api-lambda.zip").exists());
    }

    #[test]
    fn test_prestaged_requires_install_folder() {
        let dir = project();
        let err = package(
            &name(),
            dir.path(),
            &PackageConfig::default(),
            DependencySource::Prestaged,
        )
        .unwrap_err();
        assert!(matches!(err, PackError::MissingDependencyDir(_)));

        fs::create_dir_all(dir.path().join("dist/requirements")).unwrap();
        let out = package(
            &name(),
            dir.path(),
            &PackageConfig::default(),
            DependencySource::Prestaged,
        )
        .unwrap();
        assert_eq!(
            entries(&out.package_archive),
            vec!["handler.py", "requirements.txt"]
        );
    }

    #[test]
    fn test_repeat_packaging_is_stable() {
        let dir = project();
        let config = PackageConfig::default();
        let first = package(&name(), dir.path(), &config, DependencySource::Install(&NoopInstaller))
            .unwrap();
        let second = package(&name(), dir.path(), &config, DependencySource::Install(&NoopInstaller))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_outputs_json_shape() {
        let outputs = PackageOutputs {
            package_archive: PathBuf::from("dist/api-lambda.zip"),
            package_hash: Fingerprint::compute(b"x"),
            layer_archive: None,
            layer_hash: None,
        };
        let json = serde_json::to_value(&outputs).unwrap();
        assert_eq!(json["package_archive"], "dist/api-lambda.zip");
        assert!(json.get("layer_archive").is_none());
    }

    #[test]
    fn test_installer_for_config() {
        let host = format!("{:?}", installer_for(&PackageConfig::default()));
        assert!(host.starts_with("PipInstaller"), "{host}");

        let container = format!(
            "{:?}",
            installer_for(&PackageConfig {
                dockerize: true,
                runtime: "python3.11".to_string(),
                ..PackageConfig::default()
            })
        );
        assert!(container.starts_with("ContainerInstaller"), "{container}");
        assert!(container.contains("lambci/lambda:build-python3.11"), "{container}");
        assert!(container.contains("\"/io\""), "{container}");
    }
}
