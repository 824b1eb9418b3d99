//! Library folders and their `library.properties` metadata.

use crate::error::{ErrorKind, Result};
use crate::walk::{SOURCE_EXTENSIONS, find_files, sorted_entries};
use exn::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

pub const PROPERTIES_FILE: &str = "library.properties";
const SOURCE_FOLDER: &str = "src";
// Pre-1.5 layout: sources in the library root plus an optional `utility` folder.
const LEGACY_UTILITY_FOLDER: &str = "utility";

/// A library as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDir {
    /// Canonical name from `library.properties`, or the folder name.
    pub name: String,
    pub version: String,
    /// Declared architecture tags. Empty when nothing is declared.
    pub architectures: Vec<String>,
    pub folder: PathBuf,
    /// Basename of `folder`. Often not the same as `name` (`Servo-1.1.2`).
    pub folder_name: String,
}
impl LibraryDir {
    /// Reads the library rooted at `folder`. A missing `library.properties`
    /// is allowed; an unreadable one is not.
    pub fn read(folder: impl Into<PathBuf>) -> Result<Self> {
        let folder = folder.into();
        let folder_name = folder
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_raise(|| ErrorKind::Io(folder.clone()))?;
        let properties_path = folder.join(PROPERTIES_FILE);
        let properties = match fs::read(&properties_path) {
            Ok(bytes) => parse_properties(&String::from_utf8_lossy(&bytes)),
            Err(e) if e.kind() == IoErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e).or_raise(|| ErrorKind::Io(properties_path)),
        };
        let name = properties.get("name").filter(|n| !n.is_empty()).cloned().unwrap_or_else(|| folder_name.clone());
        let version = properties.get("version").cloned().unwrap_or_default();
        let architectures = properties
            .get("architectures")
            .map(|archs| archs.split(',').map(str::trim).filter(|a| !a.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        Ok(Self { name, version, architectures, folder, folder_name })
    }

    /// Whether the library uses the `src/` layout.
    pub fn has_source_folder(&self) -> bool {
        self.folder.join(SOURCE_FOLDER).is_dir()
    }

    /// Folder that `#include` directives are resolved against.
    pub fn include_folder(&self) -> PathBuf {
        match self.has_source_folder() {
            true => self.folder.join(SOURCE_FOLDER),
            false => self.folder.clone(),
        }
    }

    /// Every file that would be compiled as part of this library.
    pub fn sources(&self) -> Result<Vec<PathBuf>> {
        if self.has_source_folder() {
            return find_files(&self.folder.join(SOURCE_FOLDER), SOURCE_EXTENSIONS, true);
        }
        let mut sources = find_files(&self.folder, SOURCE_EXTENSIONS, false)?;
        sources.extend(find_files(&self.folder.join(LEGACY_UTILITY_FOLDER), SOURCE_EXTENSIONS, false)?);
        Ok(sources)
    }
}

/// Lists the libraries directly inside `root`, sorted by folder name. Folders
/// that can't be read are logged and skipped; a missing root is empty.
pub fn list_libraries(root: &Path) -> Vec<LibraryDir> {
    let entries = match sorted_entries(root) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(root = %root.display(), error = ?e, "Could not list library root");
            return Vec::new();
        },
    };
    entries
        .into_iter()
        .filter(|path| path.is_dir())
        .filter(|path| path.file_name().and_then(|n| n.to_str()).is_some_and(|n| !n.starts_with('.')))
        .filter_map(|path| match LibraryDir::read(&path) {
            Ok(library) => Some(library),
            Err(e) => {
                tracing::warn!(folder = %path.display(), error = ?e, "Skipping unreadable library");
                None
            },
        })
        .collect()
}

/// Parses `key=value` lines. Blank lines and `#` comments are ignored, keys
/// and values are trimmed, and later duplicates win.
pub fn parse_properties(text: &str) -> BTreeMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}
