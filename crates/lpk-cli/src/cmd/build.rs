//! Build command

use anyhow::{Context, Result};
use lpk_core::{DependencySource, PackError, PackageOutputs, installer_for, package};
use lpk_schema::{PackageConfig, ResourceName};
use tracing::debug;

use crate::BuildArgs;

/// Build the archives for one function and print where they went.
pub fn build(args: &BuildArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PackageConfig::from_file(path),
        None => PackageConfig::load(&args.project_root),
    }
    .map_err(PackError::from)?;
    apply_overrides(&mut config, args);
    debug!(?config, "effective configuration");

    let name = ResourceName::new(args.name.as_str()).map_err(PackError::from)?;

    let outputs = if args.skip_install {
        package(&name, &args.project_root, &config, DependencySource::Prestaged)?
    } else {
        let installer = installer_for(&config);
        package(
            &name,
            &args.project_root,
            &config,
            DependencySource::Install(installer.as_ref()),
        )?
    };

    if args.json {
        let json = serde_json::to_string_pretty(&outputs).context("serializing outputs")?;
        println!("{json}");
    } else {
        print_outputs(&outputs);
    }
    Ok(())
}

/// Layer command-line flags over the file configuration. Pattern lists
/// replace, `--no-deploy` extends, boolean flags can only switch a mode on.
fn apply_overrides(config: &mut PackageConfig, args: &BuildArgs) {
    if !args.include.is_empty() {
        config.include.clone_from(&args.include);
    }
    if !args.exclude.is_empty() {
        config.exclude.clone_from(&args.exclude);
    }
    config.no_deploy.extend(args.no_deploy.iter().cloned());
    config.layer |= args.layer;
    config.dockerize |= args.dockerize;
    if let Some(requirements) = &args.requirements {
        config.requirements_path.clone_from(requirements);
    }
    if let Some(runtime) = &args.runtime {
        config.runtime.clone_from(runtime);
    }
    if args.prefix.is_some() {
        config.prefix.clone_from(&args.prefix);
    }
}

fn print_outputs(outputs: &PackageOutputs) {
    println!(
        "{} {}",
        outputs.package_hash,
        outputs.package_archive.display()
    );
    if let (Some(archive), Some(hash)) = (&outputs.layer_archive, &outputs.layer_hash) {
        println!("{} {}", hash, archive.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::{Cli, Commands};

    fn args(argv: &[&str]) -> BuildArgs {
        let cli = Cli::parse_from(std::iter::once("lpk").chain(argv.iter().copied()));
        match cli.command {
            Commands::Build(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_flags_override_file_config() {
        let mut config = PackageConfig {
            include: vec!["src/**".to_string()],
            exclude: vec!["tests/**".to_string()],
            no_deploy: vec!["boto3".to_string()],
            ..PackageConfig::default()
        };
        apply_overrides(
            &mut config,
            &args(&[
                "build",
                "api",
                "--include",
                "handler.py",
                "--no-deploy",
                "pylint",
                "--layer",
                "--runtime",
                "python3.11",
                "--prefix",
                "prod",
            ]),
        );

        assert_eq!(config.include, vec!["handler.py"]);
        assert_eq!(config.exclude, vec!["tests/**"]);
        assert_eq!(config.no_deploy, vec!["boto3", "pylint"]);
        assert!(config.layer);
        assert!(!config.dockerize);
        assert_eq!(config.runtime, "python3.11");
        assert_eq!(config.prefix.as_deref(), Some("prod"));
    }

    #[test]
    fn test_absent_flags_keep_file_config() {
        let mut config = PackageConfig {
            layer: true,
            prefix: Some("stage".to_string()),
            ..PackageConfig::default()
        };
        let before = config.clone();
        apply_overrides(&mut config, &args(&["build", "api"]));
        assert_eq!(config, before);
    }
}
