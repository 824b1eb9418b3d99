//! Synthetic compilation units.

use crate::error::{ErrorKind, Result};
use crate::walk::{HEADER_EXTENSIONS, find_files};
use exn::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Jaro-Winkler similarity a header name must exceed to count as matching
/// the library name.
pub const MATCH_THRESHOLD: f64 = 0.9;
pub const UNIT_FILE_NAME: &str = "sketch.ino";
const LIFECYCLE_STUBS: &str = "\nvoid loop(){}\nvoid setup(){}\n";

/// Picks the headers a probe of `library_name` should include.
///
/// Every header whose file name (extension included) scores above
/// [`MATCH_THRESHOLD`] against the library name is included. When none does,
/// the first header in traversal order is used on its own.
pub fn select_headers(library_name: &str, headers: &[PathBuf]) -> Vec<PathBuf> {
    let matches: Vec<PathBuf> = headers
        .iter()
        .filter(|header| {
            let file_name = header.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            let score = strsim::jaro_winkler(&file_name, library_name);
            tracing::trace!(header = %file_name, score, "Header similarity");
            score > MATCH_THRESHOLD
        })
        .cloned()
        .collect();
    if !matches.is_empty() {
        return matches;
    }
    headers.first().cloned().into_iter().collect()
}

/// Source text of a unit that includes `headers` by file name.
pub fn render(headers: &[PathBuf]) -> String {
    let mut source = String::new();
    for header in headers {
        if let Some(name) = header.file_name() {
            source.push_str(&format!("\n#include \"{}\"", name.to_string_lossy()));
        }
    }
    source.push_str(LIFECYCLE_STUBS);
    source
}

/// A compilation unit in its own temporary directory. The directory is
/// removed when this is dropped.
#[derive(Debug)]
pub struct Unit {
    dir: TempDir,
    path: PathBuf,
    headers: Vec<PathBuf>,
}
impl Unit {
    /// Writes the probe unit for the library rooted at `folder`.
    pub fn for_library(library_name: &str, folder: &Path) -> Result<Self> {
        let headers = select_headers(library_name, &find_files(folder, HEADER_EXTENSIONS, true)?);
        if headers.is_empty() {
            tracing::debug!(library = library_name, "No headers found; probing an empty unit");
        }
        Self::write(library_name, headers)
    }

    fn write(library_name: &str, headers: Vec<PathBuf>) -> Result<Self> {
        let prefix: String = library_name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        let dir = tempfile::Builder::new().prefix(&format!("sketch{prefix}")).tempdir().or_raise(|| ErrorKind::Unit)?;
        let path = dir.path().join(UNIT_FILE_NAME);
        fs::write(&path, render(&headers)).or_raise(|| ErrorKind::Unit)?;
        Ok(Self { dir, path, headers })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[PathBuf] {
        &self.headers
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[rstest]
    #[case::confident("MyLib", &["src/MyLib.h", "src/other.h"], &["src/MyLib.h"])]
    #[case::several(
        "Adafruit_GFX",
        &["Adafruit_GFX.h", "Adafruit_GFXfont.h", "glcdfont.h"],
        &["Adafruit_GFX.h", "Adafruit_GFXfont.h"]
    )]
    #[case::fallback_first("A", &["src/A.h", "src/B.h"], &["src/A.h"])]
    #[case::fallback_traversal_order("Servo", &["zeta.h", "alpha.h"], &["zeta.h"])]
    #[case::no_headers("Empty", &[], &[])]
    fn test_select_headers(#[case] name: &str, #[case] headers: &[&str], #[case] expected: &[&str]) {
        assert_eq!(select_headers(name, &paths(headers)), paths(expected));
    }

    #[test]
    fn test_render() {
        assert_eq!(
            render(&paths(&["src/A.h", "src/utility/B.hpp"])),
            "\n#include \"A.h\"\n#include \"B.hpp\"\nvoid loop(){}\nvoid setup(){}\n"
        );
        assert_eq!(render(&[]), "\nvoid loop(){}\nvoid setup(){}\n");
    }

    #[test]
    fn test_unit_is_removed_on_drop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let folder = temp_dir.path().join("mylib-2.0.0");
        fs::create_dir_all(folder.join("src")).unwrap();
        fs::write(folder.join("src/MyLib.h"), "").unwrap();
        fs::write(folder.join("src/internal.h"), "").unwrap();

        let unit = Unit::for_library("MyLib", &folder).unwrap();
        assert_eq!(unit.headers(), &[folder.join("src/MyLib.h")]);
        assert_eq!(unit.path().file_name().unwrap(), UNIT_FILE_NAME);
        let source = fs::read_to_string(unit.path()).unwrap();
        assert!(source.contains("#include \"MyLib.h\""));
        assert!(!source.contains("internal.h"));

        let dir = unit.dir().to_path_buf();
        drop(unit);
        assert!(!dir.exists());
    }
}
