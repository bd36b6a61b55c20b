//! Path selection: include/exclude glob patterns resolved against a project
//! root.
//!
//! Patterns are matched against paths relative to the root with `/`
//! separators, so `lib\util.py` and `lib/util.py` select the same file on
//! every host. `*` stays within one path component, `**` spans any number
//! of components (including zero), and components starting with `.` only
//! match patterns that spell the dot out. Hidden directories such as
//! `.git` or `.venv` are not even entered unless an include pattern does.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use lpk_schema::CATCH_ALL;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::PackError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// De-duplicated set of absolute paths chosen for packaging.
///
/// Iteration order is unspecified; the archive writer imposes its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectedFileSet(HashSet<PathBuf>);

impl SelectedFileSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.0.iter()
    }

    /// Drop every path for which `keep` returns false.
    pub fn retain(&mut self, keep: impl FnMut(&PathBuf) -> bool) {
        self.0.retain(keep);
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.0.into_iter().collect()
    }
}

impl FromIterator<PathBuf> for SelectedFileSet {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SelectedFileSet {
    type Item = PathBuf;
    type IntoIter = std::collections::hash_set::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Normalize a user pattern to `/` separators without `.` or empty
/// components (`./src\\lib/` becomes `src/lib`).
pub fn normalize_pattern(pattern: &str) -> String {
    pattern
        .replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// A compiled pattern. The empty pattern and `**` also match the root.
struct Matcher {
    pattern: Pattern,
    matches_root: bool,
}

impl Matcher {
    fn compile(raw: &str) -> Result<Self, PackError> {
        let normalized = normalize_pattern(raw);
        let pattern = Pattern::new(&normalized).map_err(|source| PackError::Pattern {
            pattern: raw.to_string(),
            source,
        })?;
        Ok(Self {
            matches_root: normalized.is_empty() || normalized == CATCH_ALL,
            pattern,
        })
    }

    fn is_match(&self, relative: &str) -> bool {
        !relative.is_empty() && self.pattern.matches_with(relative, MATCH_OPTIONS)
    }
}

/// Every path below `root` (excluding the root itself), never descending
/// into a directory for which `prune` returns true.
///
/// Dangling symlinks are skipped: they are not files and cannot be
/// packaged. Any other traversal error, including a symlink loop, is
/// returned.
pub(crate) fn walk(
    root: &Path,
    mut prune: impl FnMut(&DirEntry) -> bool,
) -> Result<Vec<PathBuf>, PackError> {
    let mut paths = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0 && entry.file_type().is_dir() && prune(entry))
        });
    for entry in walker {
        match entry {
            Ok(entry) => paths.push(entry.into_path()),
            Err(err) if is_dangling_link(&err) => {
                debug!(path = ?err.path(), "skipping dangling symlink");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(paths)
}

fn is_dangling_link(err: &walkdir::Error) -> bool {
    err.loop_ancestor().is_none()
        && err
            .io_error()
            .is_some_and(|e| e.kind() == std::io::ErrorKind::NotFound)
        && err.path().is_some_and(|path| {
            path.symlink_metadata()
                .is_ok_and(|meta| meta.file_type().is_symlink())
        })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Whether any pattern names a `.`-prefixed component explicitly.
fn spells_hidden(patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|p| normalize_pattern(p).split('/').any(|part| part.starts_with('.')))
}

/// The project tree as `(path, relative key)` pairs. Hidden directories are
/// entered only when `hidden` is set; `skip` directories never are.
fn walk_tree(
    root: &Path,
    hidden: bool,
    skip: &[PathBuf],
) -> Result<Vec<(PathBuf, String)>, PackError> {
    let paths = walk(root, |dir| {
        (!hidden && is_hidden(dir)) || skip.iter().any(|s| s == dir.path())
    })?;
    Ok(paths
        .into_iter()
        .filter_map(|path| {
            let relative = relative_key(path.strip_prefix(root).ok()?);
            Some((path, relative))
        })
        .collect())
}

/// `/`-joined form of a relative path, independent of the host separator.
pub(crate) fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn expand(
    patterns: &[String],
    root: &Path,
    tree: &[(PathBuf, String)],
) -> Result<HashSet<PathBuf>, PackError> {
    let mut matched = HashSet::new();
    for raw in patterns {
        let matcher = Matcher::compile(raw)?;
        if matcher.matches_root {
            matched.insert(root.to_path_buf());
        }
        let before = matched.len();
        matched.extend(
            tree.iter()
                .filter(|(_, relative)| matcher.is_match(relative))
                .map(|(path, _)| path.clone()),
        );
        debug!(pattern = %raw, new = matched.len() - before, "expanded pattern");
    }
    Ok(matched)
}

fn is_catch_all(patterns: &[String]) -> bool {
    patterns.iter().any(|p| normalize_pattern(p) == CATCH_ALL)
}

/// Resolve `include` and `exclude` against `project_root`.
///
/// - catch-all exclude without catch-all include: the include matches alone
///   (an explicit include list opts out of everything else);
/// - otherwise: include matches minus exclude matches, so exclude wins on
///   overlap even when both sides are catch-all.
///
/// A pattern matching nothing contributes nothing.
///
/// # Errors
///
/// Returns [`PackError::Pattern`] for a malformed pattern, and
/// [`PackError::Walk`] if the tree cannot be traversed.
pub fn select(
    include: &[String],
    exclude: &[String],
    project_root: &Path,
) -> Result<SelectedFileSet, PackError> {
    select_skipping(include, exclude, project_root, &[])
}

/// [`select`] without descending into any of `skip_dirs` (absolute paths).
///
/// # Errors
///
/// See [`select`].
pub fn select_skipping(
    include: &[String],
    exclude: &[String],
    project_root: &Path,
    skip_dirs: &[PathBuf],
) -> Result<SelectedFileSet, PackError> {
    let tree = walk_tree(project_root, spells_hidden(include), skip_dirs)?;
    let included = expand(include, project_root, &tree)?;
    let excluded = expand(exclude, project_root, &tree)?;

    let selected: SelectedFileSet = if is_catch_all(exclude) && !is_catch_all(include) {
        included.into_iter().collect()
    } else {
        included.difference(&excluded).cloned().collect()
    };

    debug!(
        root = %project_root.display(),
        selected = selected.len(),
        "selected paths"
    );
    Ok(selected)
}
