//! End-to-end tests driving the `lpk` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// A throwaway project with a handler and an (empty) prestaged install folder.
struct TestProject {
    dir: TempDir,
}

impl TestProject {
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let project = Self { dir };
        project.write("handler.py", "def handler(event, context):\n    return 1\n");
        project.write("lib/util.py", "X = 1\n");
        project
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn prestage(&self) -> PathBuf {
        let install = self.root().join("dist/requirements");
        fs::create_dir_all(&install).unwrap();
        install
    }

    fn lpk(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_lpk"))
            .args(args)
            .arg("--project-root")
            .arg(self.root())
            .env_remove("RUST_LOG")
            .output()
            .expect("failed to run lpk")
    }
}

fn entries(archive: &Path) -> Vec<String> {
    let zip = zip::ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_lpk"))
        .arg("--help")
        .output()
        .expect("failed to run lpk");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("build"));
}

#[test]
fn test_version_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_lpk"))
        .arg("--version")
        .output()
        .expect("failed to run lpk");
    assert!(output.status.success());
}

#[test]
fn test_build_with_prestaged_dependencies() {
    let project = TestProject::new();
    let install = project.prestage();
    fs::create_dir_all(install.join("six")).unwrap();
    fs::write(install.join("six/__init__.py"), "").unwrap();

    let output = project.lpk(&["build", "api", "--skip-install"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let archive = project.root().join("dist/api-lambda.zip");
    assert_eq!(
        entries(&archive),
        vec!["handler.py", "lib/util.py", "six/__init__.py"]
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.trim_end().ends_with("api-lambda.zip"));
}

#[test]
fn test_build_json_outputs() {
    let project = TestProject::new();
    project.prestage();

    let output = project.lpk(&[
        "build",
        "api",
        "--skip-install",
        "--layer",
        "--prefix",
        "prod",
        "--json",
    ]);
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let package = json["package_archive"].as_str().unwrap();
    assert!(package.ends_with("prod-api-lambda.zip"));
    assert!(json["layer_archive"]
        .as_str()
        .unwrap()
        .ends_with("prod-api-requirements.zip"));
    assert_eq!(json["package_hash"].as_str().unwrap().len(), 44);
    assert!(json["layer_hash"].is_string());
}

#[test]
fn test_repeated_builds_print_the_same_hash() {
    let project = TestProject::new();
    project.prestage();

    let first = project.lpk(&["build", "api", "--skip-install"]);
    let second = project.lpk(&["build", "api", "--skip-install"]);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_include_and_exclude_flags() {
    let project = TestProject::new();
    project.prestage();
    project.write("notes.txt", "todo\n");

    let output = project.lpk(&[
        "build",
        "api",
        "--skip-install",
        "--exclude",
        "**/*.txt",
        "--exclude",
        "lib/**",
    ]);
    assert!(output.status.success());
    assert_eq!(
        entries(&project.root().join("dist/api-lambda.zip")),
        vec!["handler.py"]
    );
}

#[test]
fn test_config_file_is_read() {
    let project = TestProject::new();
    project.write("lpk.toml", "staging_dir = \"build\"\nprefix = \"dev\"\n");
    fs::create_dir_all(project.root().join("build/requirements")).unwrap();

    let output = project.lpk(&["build", "api", "--skip-install"]);
    assert!(output.status.success());
    assert!(project.root().join("build/dev-api-lambda.zip").is_file());
}

#[test]
fn test_missing_dependency_dir_fails_with_configuration_error() {
    let project = TestProject::new();

    let output = project.lpk(&["build", "api", "--skip-install"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration failed"), "stderr: {stderr}");
}

#[test]
fn test_missing_manifest_fails() {
    let project = TestProject::new();

    let output = project.lpk(&["build", "api"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("dependency manifest not found"), "stderr: {stderr}");
}

#[test]
fn test_invalid_name_is_rejected() {
    let project = TestProject::new();
    project.prestage();

    let output = project.lpk(&["build", "my/function", "--skip-install"]);
    assert!(!output.status.success());
}

#[test]
fn test_hash_command() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("hello.txt");
    fs::write(&file, "hello world").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_lpk"))
        .arg("hash")
        .arg(&file)
        .output()
        .expect("failed to run lpk");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("uU0nuZNNPgilLlLX2n2r+sSE7+N6U4DukIj3rOLvzek= "));
}

#[test]
fn test_clean_removes_staging_dir() {
    let project = TestProject::new();
    project.prestage();

    let dry = project.lpk(&["clean", "--dry-run"]);
    assert!(dry.status.success());
    assert!(project.root().join("dist").exists());

    let output = project.lpk(&["clean"]);
    assert!(output.status.success());
    assert!(!project.root().join("dist").exists());
    assert!(project.root().join("handler.py").exists());
}

#[test]
fn test_clean_refuses_project_root() {
    let project = TestProject::new();

    let output = project.lpk(&["clean", "--staging-dir", "."]);
    assert!(!output.status.success());
    assert!(project.root().join("handler.py").exists());
}
