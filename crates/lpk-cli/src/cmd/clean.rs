//! Clean command

use std::path::Path;

use anyhow::{Context, Result, bail};
use lpk_core::PackError;
use lpk_schema::PackageConfig;
use tracing::info;

/// Remove the staging directory of the project at `project_root`.
pub fn clean(project_root: &Path, staging_dir: Option<&Path>, dry_run: bool) -> Result<()> {
    let staging = match staging_dir {
        Some(dir) => project_root.join(dir),
        None => {
            let config = PackageConfig::load(project_root).map_err(PackError::from)?;
            project_root.join(config.staging_dir)
        }
    };

    if !staging.exists() {
        println!("Nothing to clean.");
        return Ok(());
    }

    let root = project_root
        .canonicalize()
        .with_context(|| format!("resolving {}", project_root.display()))?;
    let target = staging
        .canonicalize()
        .with_context(|| format!("resolving {}", staging.display()))?;
    if root.starts_with(&target) {
        bail!(
            "refusing to remove {}: it contains the project root",
            target.display()
        );
    }

    if dry_run {
        println!("Would remove {}", target.display());
        return Ok(());
    }

    std::fs::remove_dir_all(&target)
        .with_context(|| format!("removing {}", target.display()))?;
    info!(dir = %target.display(), "removed staging directory");
    println!("Removed {}", target.display());
    Ok(())
}
