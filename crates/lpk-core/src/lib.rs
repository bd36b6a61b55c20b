pub mod archive;
pub mod builder;
pub mod error;
pub mod install;
pub mod package;
pub mod requirements;
pub mod select;
pub mod staging;

pub use archive::{ArchiveWriter, FIXED_TIMESTAMP, FixedTimestamp, WriteMode, is_allowed};
pub use builder::{ArchiveBuilder, BuildOutput, BuildState, PackageSpec};
pub use error::{PackError, Phase};
pub use install::{ContainerInstaller, InstallError, Installer, NoopInstaller, PipInstaller};
pub use package::{DependencySource, PackageOutputs, fingerprint, installer_for, package};
pub use requirements::RequirementsManifest;
pub use select::{SelectedFileSet, select, select_skipping};
pub use staging::StagingLayout;
