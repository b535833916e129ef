//! Boundary lint for the `divedesk` backend.
//!
//! The backend is split into zones (see [`Zone`]). Each zone has crate
//! modules and external crates it must not name; the lint parses every
//! file under `backend/src`, resolves the paths it mentions against the
//! file's own module and reports each forbidden one. Files at the crate
//! root (`lib.rs`, `main.rs`, `config.rs`) do the wiring and are skipped.
//!
//! Run it with `cargo run -p architecture-lint [BACKEND_DIR]`.

mod resolve;
mod zone;

use std::fmt;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs::Dir};

use resolve::{Reference, Target};
pub use zone::Zone;

/// A backend source file, path relative to `backend/src`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Relative path such as `domain/visit.rs`.
    pub path: Utf8PathBuf,
    /// File contents.
    pub contents: String,
}

impl SourceFile {
    /// Pair a relative path with its contents.
    pub fn new(path: impl Into<Utf8PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// A forbidden path named by a file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Violation {
    /// File path relative to `backend/src`.
    pub file: Utf8PathBuf,
    /// Zone the file belongs to.
    pub zone: Zone,
    /// The path as written in the file.
    pub written: String,
    /// The module or crate it resolves into.
    pub forbidden: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} must not use `{}` (named as `{}`)",
            self.file, self.zone, self.forbidden, self.written
        )
    }
}

/// Why a lint run did not pass.
#[derive(Debug)]
pub enum LintError {
    /// Reading the source tree failed.
    Io {
        /// Directory or file being read.
        path: Utf8PathBuf,
        /// Underlying failure.
        source: io::Error,
    },
    /// A file name under the source tree is not UTF-8.
    NonUtf8 {
        /// Directory holding the entry.
        dir: Utf8PathBuf,
    },
    /// A file is not valid Rust.
    Parse {
        /// File path relative to `backend/src`.
        file: Utf8PathBuf,
        /// Parser message.
        message: String,
    },
    /// The tree parsed but crosses boundaries.
    Violations(Vec<Violation>),
}

impl fmt::Display for LintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read {path}: {source}"),
            Self::NonUtf8 { dir } => write!(f, "{dir} holds a file name that is not UTF-8"),
            Self::Parse { file, message } => write!(f, "cannot parse {file}: {message}"),
            Self::Violations(found) => {
                write!(f, "{} boundary violation(s):", found.len())?;
                for violation in found {
                    write!(f, "\n  {violation}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for LintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Check every `.rs` file under `backend_dir/src`.
///
/// Returns how many zoned files were checked.
pub fn check_backend(backend_dir: &Utf8Path) -> Result<usize, LintError> {
    let src = backend_dir.join("src");
    let dir = Dir::open_ambient_dir(&src, ambient_authority()).map_err(|source| LintError::Io {
        path: src.clone(),
        source,
    })?;
    let mut files = Vec::new();
    collect_sources(&dir, &src, Utf8Path::new(""), &mut files)?;
    check_sources(&files)
}

/// Check already-loaded sources.
///
/// Returns how many zoned files were checked; every violation across all
/// files is reported together, sorted by file.
pub fn check_sources(files: &[SourceFile]) -> Result<usize, LintError> {
    let mut checked = 0;
    let mut found = Vec::new();
    for file in files {
        let Some(zone) = Zone::of(&file.path) else {
            continue;
        };
        let parsed = syn::parse_file(&file.contents).map_err(|err| LintError::Parse {
            file: file.path.clone(),
            message: err.to_string(),
        })?;
        checked += 1;
        let module = resolve::module_of(&file.path);
        found.extend(
            resolve::references(module, &parsed)
                .into_iter()
                .filter_map(|reference| breach(zone, reference))
                .map(|(written, forbidden)| Violation {
                    file: file.path.clone(),
                    zone,
                    written,
                    forbidden,
                }),
        );
    }
    if found.is_empty() {
        return Ok(checked);
    }
    found.sort();
    found.dedup();
    Err(LintError::Violations(found))
}

fn breach(zone: Zone, reference: Reference) -> Option<(String, String)> {
    let forbidden = match &reference.target {
        Target::Local(segments) => zone
            .forbidden_modules()
            .iter()
            .find(|module| within(segments, module))
            .map(|module| format!("crate::{}", module.join("::")))?,
        Target::External(root) => zone
            .forbidden_crates()
            .iter()
            .find(|name| **name == root.as_str())
            .map(|name| (*name).to_owned())?,
    };
    Some((reference.written, forbidden))
}

fn within(segments: &[String], module: &[&str]) -> bool {
    segments.len() >= module.len() && segments.iter().zip(module).all(|(have, want)| have == want)
}

fn collect_sources(
    dir: &Dir,
    shown: &Utf8Path,
    relative: &Utf8Path,
    files: &mut Vec<SourceFile>,
) -> Result<(), LintError> {
    let io_error = |source: io::Error| LintError::Io {
        path: shown.to_owned(),
        source,
    };
    let mut entries = Vec::new();
    for listed in dir.entries().map_err(io_error)? {
        let entry = listed.map_err(io_error)?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| LintError::NonUtf8 {
                dir: shown.to_owned(),
            })?;
        let is_dir = entry.file_type().map_err(io_error)?.is_dir();
        entries.push((name, is_dir, entry));
    }
    entries.sort_by(|left, right| left.0.cmp(&right.0));
    for (name, is_dir, entry) in entries {
        if is_dir {
            let child = entry.open_dir().map_err(io_error)?;
            collect_sources(&child, &shown.join(&name), &relative.join(&name), files)?;
        } else if Utf8Path::new(&name).extension() == Some("rs") {
            let contents = dir.read_to_string(&name).map_err(|source| LintError::Io {
                path: shown.join(&name),
                source,
            })?;
            files.push(SourceFile::new(relative.join(&name), contents));
        }
    }
    Ok(())
}
