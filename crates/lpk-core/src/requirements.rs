//! Dependency manifest (`requirements.txt`) filtering.
//!
//! Only as much of the format is understood as filtering needs: a
//! requirement's name. Everything else on the line (specifiers, extras,
//! markers, URLs) is carried through untouched.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{PackError, Phase};

/// One meaningful manifest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLine {
    /// A requirement, keyed by its normalized project name.
    Requirement { name: String, line: String },
    /// An option such as `--index-url ...` or `-r base.txt`, kept verbatim.
    Option(String),
}

/// Parsed dependency manifest with comments and blank lines dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequirementsManifest {
    lines: Vec<ManifestLine>,
}

/// Normalize a project name for comparison: lowercase, with runs of `-`,
/// `_` and `.` folded to a single `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            pending_dash = true;
            continue;
        }
        if pending_dash && !out.is_empty() {
            out.push('-');
        }
        pending_dash = false;
        out.push(ch.to_ascii_lowercase());
    }
    out
}

/// Leading project name of a requirement line (`requests[socks]>=2` -> `requests`).
fn requirement_name(line: &str) -> &str {
    let end = line
        .find(|c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | ';' | '[' | ' ' | '@' | '(' | '\t'))
        .unwrap_or(line.len());
    &line[..end]
}

/// Drop a trailing ` #` comment.
fn strip_comment(line: &str) -> &str {
    let cut = line
        .find(" #")
        .or_else(|| line.find("\t#"))
        .unwrap_or(line.len());
    line[..cut].trim()
}

impl RequirementsManifest {
    /// Parse manifest text.
    ///
    /// A repeated requirement keeps the position of its first occurrence and
    /// the text of its last one.
    pub fn parse(content: &str) -> Self {
        let mut manifest = Self::default();
        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('-') {
                manifest.lines.push(ManifestLine::Option(line.to_string()));
                continue;
            }

            let line = strip_comment(line);
            let name = normalize_name(requirement_name(line));
            if name.is_empty() {
                continue;
            }
            let existing = manifest.lines.iter().position(
                |l| matches!(l, ManifestLine::Requirement { name: n, .. } if *n == name),
            );
            let entry = ManifestLine::Requirement {
                name,
                line: line.to_string(),
            };
            match existing {
                Some(index) => manifest.lines[index] = entry,
                None => manifest.lines.push(entry),
            }
        }
        manifest
    }

    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::MissingManifest`] when the file does not exist and
    /// an I/O error when it cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, PackError> {
        if !path.is_file() {
            return Err(PackError::MissingManifest(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)
            .map_err(|e| PackError::io(Phase::Configuration, path.display(), e))?;
        Ok(Self::parse(&content))
    }

    pub fn lines(&self) -> &[ManifestLine] {
        &self.lines
    }

    /// Normalized names of all requirements, in manifest order.
    pub fn names(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                ManifestLine::Requirement { name, .. } => Some(name.as_str()),
                ManifestLine::Option(_) => None,
            })
            .collect()
    }

    /// Remove requirements named in `no_deploy`. Names that are not in the
    /// manifest are ignored.
    pub fn without(mut self, no_deploy: &[String]) -> Self {
        let omit: Vec<String> = no_deploy.iter().map(|n| normalize_name(n)).collect();
        self.lines.retain(|l| match l {
            ManifestLine::Requirement { name, .. } => {
                let keep = !omit.contains(name);
                if !keep {
                    debug!(requirement = %name, "omitted from deployment");
                }
                keep
            }
            ManifestLine::Option(_) => true,
        });
        self
    }

    /// Manifest text, one newline-terminated line per entry.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            let text = match line {
                ManifestLine::Requirement { line, .. } => line,
                ManifestLine::Option(option) => option,
            };
            out.push_str(text);
            out.push('\n');
        }
        out
    }

    /// Write the rendered manifest to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), PackError> {
        fs::write(path, self.render())
            .map_err(|e| PackError::io(Phase::DependencyStaging, path.display(), e))
    }
}
