//! Deterministic file discovery.
//!
//! Traversal order matters: when no header is a confident match for the
//! library name, the *first* header found is the one that gets included. So
//! the order is fixed: within a directory, entries are sorted by file name;
//! all matching files of a directory come before any of its subdirectories;
//! subdirectories are visited in that same sorted order.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// Header extensions considered when building a probe.
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hpp"];
/// Extensions of example programs.
pub const EXAMPLE_EXTENSIONS: &[&str] = &["ino", "pde"];
/// Extensions of every file the include scanner reads from a library.
pub const SOURCE_EXTENSIONS: &[&str] = &["h", "hpp", "c", "cpp", "S"];

// Symlinked directories are followed; this stops a link cycle from recursing forever.
const MAX_DEPTH: usize = 32;

enum WalkEntry {
    File(PathBuf),
    Descend(PathBuf),
    Skip,
}

/// Lists files under `root` whose extension is one of `extensions`, in the
/// deterministic order described in the [module docs](self).
///
/// A `root` that doesn't exist yields an empty list rather than an error.
pub fn find_files(root: &Path, extensions: &[&str], recurse: bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(root, extensions, recurse, 0, &mut found)?;
    Ok(found)
}

fn walk(dir: &Path, extensions: &[&str], recurse: bool, depth: usize, found: &mut Vec<PathBuf>) -> Result<()> {
    if depth > MAX_DEPTH {
        tracing::warn!(dir = %dir.display(), "Directory nesting too deep; not descending further");
        return Ok(());
    }
    let mut subdirs = Vec::new();
    for entry in sorted_entries(dir)? {
        match classify(entry, extensions) {
            WalkEntry::File(path) => found.push(path),
            WalkEntry::Descend(path) if recurse => subdirs.push(path),
            WalkEntry::Descend(_) | WalkEntry::Skip => {},
        }
    }
    for subdir in subdirs {
        walk(&subdir, extensions, recurse, depth + 1, found)?;
    }
    Ok(())
}

/// Directory entries sorted by file name. Missing directories are empty.
pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Io(dir.to_path_buf())),
    };
    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .or_raise(|| ErrorKind::Io(dir.to_path_buf()))?;
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

fn classify(path: PathBuf, extensions: &[&str]) -> WalkEntry {
    let hidden = path.file_name().and_then(|n| n.to_str()).is_none_or(|n| n.starts_with('.'));
    if hidden {
        return WalkEntry::Skip;
    }
    // Follows symlinks. Broken links are neither and get dropped.
    if path.is_dir() {
        return WalkEntry::Descend(path);
    }
    if path.is_file() && has_extension(&path, extensions) {
        return WalkEntry::File(path);
    }
    WalkEntry::Skip
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
}
