//! Deterministic ZIP writer.
//!
//! Two runs over identical file contents must produce byte-identical
//! archives, whatever the host, the wall clock or the order in which the
//! filesystem listed the inputs. Three things make that hold:
//!
//! 1. inputs are sorted by their string form before anything is written;
//! 2. every entry carries the same [`FixedTimestamp`] instead of its mtime;
//! 3. unix permissions are reduced to `0o755` / `0o644`.
//!
//! Bytecode caches and packaging metadata differ between machines and are
//! dropped by [`is_allowed`] before they reach the archive.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use glob::{MatchOptions, Pattern};
use tracing::{debug, trace};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PackError, Phase};
use crate::select::relative_key;

/// Paths matching any of these (shell-style, `*` crosses separators) never
/// enter an archive.
pub const IGNORE_PATTERNS: [&str; 4] = [
    "*.py[c|o]",
    "*/__pycache__*",
    "__pycache__*",
    "*.dist-info*",
];

static IGNORE: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    IGNORE_PATTERNS
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect()
});

const IGNORE_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Default allow predicate: rejects compiled bytecode, `__pycache__`
/// directories and `*.dist-info` metadata.
pub fn is_allowed(path: &Path) -> bool {
    !IGNORE
        .iter()
        .any(|pattern| pattern.matches_path_with(path, IGNORE_OPTIONS))
}

/// Modification time stamped on every entry, in ZIP (DOS) resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// 2020-01-01 00:00:00, shared by every archive lpk has ever written.
pub const FIXED_TIMESTAMP: FixedTimestamp = FixedTimestamp {
    year: 2020,
    month: 1,
    day: 1,
    hour: 0,
    minute: 0,
    second: 0,
};

impl FixedTimestamp {
    fn to_zip(self) -> Result<zip::DateTime, PackError> {
        zip::DateTime::from_date_and_time(
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
        .map_err(|_| PackError::Timestamp(self.to_string()))
    }
}

impl std::fmt::Display for FixedTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// How the archive file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create the archive, truncating any previous file.
    Create,
    /// Add entries after the existing ones (creates the file if missing).
    Append,
}

/// Writes sorted, timestamp-normalized ZIP archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveWriter {
    timestamp: FixedTimestamp,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self {
            timestamp: FIXED_TIMESTAMP,
        }
    }

    /// A writer stamping entries with `timestamp` instead of [`FIXED_TIMESTAMP`].
    pub fn with_timestamp(timestamp: FixedTimestamp) -> Self {
        Self { timestamp }
    }

    pub fn timestamp(&self) -> FixedTimestamp {
        self.timestamp
    }

    /// Write `paths` into `archive_path`, entries named relative to `base_path`.
    ///
    /// Paths are sorted first. Rejected paths (per `allow`) and anything
    /// that is not a regular file are skipped; directories never get an
    /// entry of their own.
    ///
    /// Returns `archive_path` unchanged so an append can follow.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Archive`] or [`PackError::Io`] on any I/O or ZIP
    /// failure. A failed write may leave a truncated archive behind.
    pub fn write<'p, I, F>(
        &self,
        archive_path: &'p Path,
        paths: I,
        base_path: &Path,
        mode: WriteMode,
        allow: F,
    ) -> Result<&'p Path, PackError>
    where
        I: IntoIterator<Item = PathBuf>,
        F: Fn(&Path) -> bool,
    {
        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
        self.write_in_order(archive_path, &paths, base_path, mode, allow)?;
        Ok(archive_path)
    }

    /// Write `paths` exactly in the given order. Only [`Self::write`] should
    /// call this in production code: the ordering is what makes the output
    /// reproducible.
    pub(crate) fn write_in_order<F>(
        &self,
        archive_path: &Path,
        paths: &[PathBuf],
        base_path: &Path,
        mode: WriteMode,
        allow: F,
    ) -> Result<usize, PackError>
    where
        F: Fn(&Path) -> bool,
    {
        let zip_error = |source: zip::result::ZipError| PackError::Archive {
            path: archive_path.to_path_buf(),
            source,
        };

        let mut zip = open(archive_path, mode)?;
        let modified = self.timestamp.to_zip()?;
        let mut written = 0;

        for path in paths {
            if !allow(path) {
                trace!(path = %path.display(), "ignored");
                continue;
            }
            if !path.is_file() {
                continue;
            }

            let relative = path
                .strip_prefix(base_path)
                .map_err(|_| PackError::OutsideBase {
                    path: path.clone(),
                    base: base_path.to_path_buf(),
                })?;
            let name = relative_key(relative);

            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(modified)
                .unix_permissions(normalized_mode(path)?);

            zip.start_file(name, options).map_err(zip_error)?;
            let mut source = File::open(path)
                .map_err(|e| PackError::io(Phase::ArchiveWrite, path.display(), e))?;
            io::copy(&mut source, &mut zip)
                .map_err(|e| PackError::io(Phase::ArchiveWrite, path.display(), e))?;
            written += 1;
        }

        zip.finish().map_err(zip_error)?;
        debug!(
            archive = %archive_path.display(),
            ?mode,
            entries = written,
            "wrote archive"
        );
        Ok(written)
    }
}

/// [`ArchiveWriter::write`] with the default timestamp.
///
/// # Errors
///
/// See [`ArchiveWriter::write`].
pub fn write<'p, I, F>(
    archive_path: &'p Path,
    paths: I,
    base_path: &Path,
    mode: WriteMode,
    allow: F,
) -> Result<&'p Path, PackError>
where
    I: IntoIterator<Item = PathBuf>,
    F: Fn(&Path) -> bool,
{
    ArchiveWriter::new().write(archive_path, paths, base_path, mode, allow)
}

fn open(archive_path: &Path, mode: WriteMode) -> Result<ZipWriter<File>, PackError> {
    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PackError::io(Phase::ArchiveWrite, parent.display(), e))?;
    }

    let io_error = |e| PackError::io(Phase::ArchiveWrite, archive_path.display(), e);

    match mode {
        WriteMode::Append if archive_path.is_file() => {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(archive_path)
                .map_err(io_error)?;
            ZipWriter::new_append(file).map_err(|source| PackError::Archive {
                path: archive_path.to_path_buf(),
                source,
            })
        }
        WriteMode::Create | WriteMode::Append => {
            let file = File::create(archive_path).map_err(io_error)?;
            Ok(ZipWriter::new(file))
        }
    }
}

/// `0o755` when the file has any execute bit, `0o644` otherwise.
#[cfg(unix)]
fn normalized_mode(path: &Path) -> Result<u32, PackError> {
    use std::os::unix::fs::PermissionsExt;

    let mode = fs::metadata(path)
        .map_err(|e| PackError::io(Phase::ArchiveWrite, path.display(), e))?
        .permissions()
        .mode();
    Ok(if mode & 0o111 != 0 { 0o755 } else { 0o644 })
}

#[cfg(not(unix))]
fn normalized_mode(_path: &Path) -> Result<u32, PackError> {
    Ok(0o644)
}
