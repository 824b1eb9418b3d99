//! In-process Build Pipeline that resolves `#include` directives the way the
//! library-detection pass of the real toolchain does.
//!
//! Starting from the unit, every file is scanned for includes. Each include is
//! resolved, in order, against:
//!
//! 1. The including file's own folder (quoted includes only).
//! 2. The include folders of libraries already imported.
//! 3. The library index. A library is a candidate when its include folder
//!    contains the header; a candidate whose folder name (or alias) equals the
//!    header's stem wins, otherwise the first candidate in search order does.
//!    The winner is imported and all of its sources are queued for scanning.
//!
//! An angle-bracket include that resolves nowhere is assumed to come from the
//! toolchain. A quoted one is too, if a header of that name exists under the
//! hardware or tools folders; otherwise the build fails.

use super::{BuildPipeline, BuildReport, BuildRequest, BuildStatus, ImportedLibrary, SearchContext};
use crate::consts::includes;
use crate::error::{ErrorKind, Result};
use crate::library::{LibraryDir, list_libraries};
use crate::walk::{HEADER_EXTENSIONS, find_files};
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A value derived from a set of folders, rebuilt when the folders change.
struct Cached<T> {
    roots: Vec<PathBuf>,
    value: Arc<T>,
}

type Cache<T> = Mutex<Option<Cached<T>>>;

fn cached<T>(cache: &Cache<T>, roots: Vec<PathBuf>, build: impl FnOnce(&[PathBuf]) -> Result<T>) -> Result<Arc<T>> {
    let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(entry) = cache.as_ref()
        && entry.roots == roots
    {
        return Ok(Arc::clone(&entry.value));
    }
    let value = Arc::new(build(&roots)?);
    *cache = Some(Cached { roots, value: Arc::clone(&value) });
    Ok(value)
}

#[derive(Default)]
pub struct IncludeScanPipeline {
    // Every library under the library roots, in search order.
    libraries: Arc<Cache<Vec<Candidate>>>,
    // Header file names under the hardware/tools folders.
    toolchain: Arc<Cache<BTreeSet<String>>>,
}
impl IncludeScanPipeline {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BuildPipeline for IncludeScanPipeline {
    fn name(&self) -> &str {
        "include-scan"
    }

    async fn build(&self, request: &BuildRequest) -> Result<BuildReport> {
        let request = request.clone();
        let libraries = Arc::clone(&self.libraries);
        let toolchain = Arc::clone(&self.toolchain);
        tokio::task::spawn_blocking(move || Scan::new(&request.search, &libraries, toolchain)?.run(&request.unit))
            .await
            .or_raise(|| ErrorKind::Pipeline)?
    }
}

#[derive(Clone)]
struct Candidate {
    library: LibraryDir,
    include_folder: PathBuf,
}
impl Candidate {
    fn new(library: LibraryDir) -> Self {
        Self { include_folder: library.include_folder(), library }
    }
}

struct Scan<'a> {
    search: &'a SearchContext,
    libraries: Arc<Vec<Candidate>>,
    // Aliased folders outside every library root. Searched before `libraries`.
    aliased: Vec<Candidate>,
    toolchain: Arc<Cache<BTreeSet<String>>>,
    imported: Vec<ImportedLibrary>,
    include_folders: Vec<PathBuf>,
    queue: VecDeque<PathBuf>,
    scanned: HashSet<PathBuf>,
}
impl<'a> Scan<'a> {
    fn new(
        search: &'a SearchContext,
        libraries: &Cache<Vec<Candidate>>,
        toolchain: Arc<Cache<BTreeSet<String>>>,
    ) -> Result<Self> {
        let roots = search.library_roots().map(Path::to_path_buf).collect();
        let libraries = cached(libraries, roots, |roots| {
            let libraries: Vec<Candidate> =
                roots.iter().flat_map(|root| list_libraries(root)).map(Candidate::new).collect();
            tracing::debug!(libraries = libraries.len(), "Indexed libraries");
            Ok(libraries)
        })?;
        let mut aliased = Vec::new();
        for folder in search.aliases.values() {
            if libraries.iter().chain(aliased.iter()).any(|c: &Candidate| &c.library.folder == folder) {
                continue;
            }
            match LibraryDir::read(folder) {
                Ok(library) => aliased.push(Candidate::new(library)),
                Err(e) => tracing::warn!(folder = %folder.display(), error = ?e, "Aliased folder is not a library"),
            }
        }
        Ok(Self {
            search,
            libraries,
            aliased,
            toolchain,
            imported: Vec::new(),
            include_folders: Vec::new(),
            queue: VecDeque::new(),
            scanned: HashSet::new(),
        })
    }

    fn run(mut self, unit: &Path) -> Result<BuildReport> {
        if !unit.is_file() {
            exn::bail!(ErrorKind::Io(unit.to_path_buf()));
        }
        self.queue.push_back(normalize(unit));
        while let Some(file) = self.queue.pop_front() {
            if !self.scanned.insert(file.clone()) {
                continue;
            }
            let bytes = fs::read(&file).or_raise(|| ErrorKind::Io(file.clone()))?;
            for (quoted, header) in includes(&String::from_utf8_lossy(&bytes)) {
                if let Some(failure) = self.include(&file, quoted, &header)? {
                    return Ok(self.report(BuildStatus::Failed(failure)));
                }
            }
        }
        Ok(self.report(BuildStatus::Success))
    }

    /// Resolves one include. Returns a failure message if it can't be resolved.
    fn include(&mut self, from: &Path, quoted: bool, header: &str) -> Result<Option<String>> {
        if quoted && let Some(local) = from.parent().and_then(|dir| existing(dir, header)) {
            self.queue.push_back(local);
            return Ok(None);
        }
        if let Some(found) = self.include_folders.iter().find_map(|dir| existing(dir, header)) {
            self.queue.push_back(found);
            return Ok(None);
        }
        if let Some(candidate) = self.resolve(header) {
            tracing::trace!(header, library = %candidate.library.name, "Include resolved to library");
            self.imported.push(ImportedLibrary {
                name: candidate.library.name.clone(),
                folder: candidate.library.folder.clone(),
            });
            self.queue.extend(candidate.library.sources()?.iter().map(|path| normalize(path)));
            self.include_folders.push(candidate.include_folder);
            return Ok(None);
        }
        if !quoted || self.is_toolchain_header(header)? {
            tracing::trace!(header, "Assuming toolchain header");
            return Ok(None);
        }
        Ok(Some(format!("{}: fatal error: {header}: No such file or directory", from.display())))
    }

    fn resolve(&self, header: &str) -> Option<Candidate> {
        let stem = Path::new(header).file_stem().and_then(|s| s.to_str()).unwrap_or(header);
        let imported: HashSet<&Path> = self.imported.iter().map(|lib| lib.folder.as_path()).collect();
        let candidates: Vec<&Candidate> = self
            .aliased
            .iter()
            .chain(self.libraries.iter())
            .filter(|c| !imported.contains(c.library.folder.as_path()))
            .filter(|c| c.include_folder.join(header).is_file())
            .collect();
        candidates
            .iter()
            .find(|c| self.is_named(c, stem))
            .or_else(|| candidates.first())
            .map(|c| (*c).clone())
    }

    /// Whether `name` is the candidate's folder name or one of its aliases.
    fn is_named(&self, candidate: &Candidate, name: &str) -> bool {
        candidate.library.folder_name == name || self.search.aliases_of(&candidate.library.folder).any(|a| a == name)
    }

    fn is_toolchain_header(&self, header: &str) -> Result<bool> {
        let Some(name) = Path::new(header).file_name().and_then(|n| n.to_str()) else {
            return Ok(false);
        };
        let roots = self.search.hardware.iter().chain(self.search.tools.iter()).cloned().collect();
        let headers = cached(&self.toolchain, roots, |roots| {
            let mut headers = BTreeSet::new();
            for root in roots {
                for path in find_files(root, HEADER_EXTENSIONS, true)? {
                    if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
                        headers.insert(file_name.to_string());
                    }
                }
            }
            tracing::debug!(headers = headers.len(), "Indexed toolchain headers");
            Ok(headers)
        })?;
        Ok(headers.contains(name))
    }

    fn report(self, status: BuildStatus) -> BuildReport {
        BuildReport { imported: self.imported, include_folders: self.include_folders, status }
    }
}

/// `dir/header`, normalized, if it's a file.
fn existing(dir: &Path, header: &str) -> Option<PathBuf> {
    Some(normalize(&dir.join(header))).filter(|path| path.is_file())
}

/// Drops `.` and folds `..` into its parent without touching the filesystem,
/// so a file reached through different relative includes has one spelling.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                },
                Some(Component::RootDir | Component::Prefix(_)) => {},
                Some(Component::CurDir | Component::ParentDir) | None => normalized.push(".."),
            },
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn request(unit: PathBuf, search: SearchContext) -> BuildRequest {
        BuildRequest { unit, target: "arduino:avr:uno".to_string(), search }
    }

    fn names(report: &BuildReport) -> Vec<&str> {
        report.imported.iter().map(|lib| lib.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_transitive_imports() {
        let temp_dir = tempfile::tempdir().unwrap();
        let other = temp_dir.path().join("libraries");
        let built_in = temp_dir.path().join("ide");
        write(&other, "A-1.0.0/library.properties", "name=A\nversion=1.0.0\n");
        write(&other, "A-1.0.0/src/A.h", "#include <Arduino.h>\n");
        write(&other, "b/library.properties", "name=B\nversion=1.0.0\n");
        write(&other, "b/src/B.h", "#include \"A.h\"\n");
        write(&other, "b/src/B.cpp", "#include \"B.h\"\n#include <Wire.h>\n");
        write(&built_in, "Wire/src/Wire.h", "#include \"utility/twi.h\"\n");
        write(&built_in, "Wire/src/utility/twi.h", "");
        let unit = write(temp_dir.path(), "sketch/sketch.ino", "\n#include \"B.h\"\nvoid loop(){}\nvoid setup(){}\n");
        let search =
            SearchContext { other: vec![other.clone()], built_in: vec![built_in.clone()], ..Default::default() };

        let report = IncludeScanPipeline::new().build(&request(unit, search)).await.unwrap();
        assert!(report.is_success());
        // `B.cpp` sorts before `B.h`, so `Wire` is reached before `A`.
        assert_eq!(names(&report), vec!["B", "Wire", "A"]);
        assert_eq!(
            report.include_folders,
            vec![other.join("b/src"), built_in.join("Wire/src"), other.join("A-1.0.0/src")]
        );
    }

    #[tokio::test]
    async fn test_missing_quoted_include_fails_with_partial_imports() {
        let temp_dir = tempfile::tempdir().unwrap();
        let other = temp_dir.path().join("libraries");
        write(&other, "B/src/B.h", "#include \"Missing.h\"\n");
        let unit = write(temp_dir.path(), "sketch/sketch.ino", "#include \"B.h\"\n");
        let search = SearchContext { other: vec![other], ..Default::default() };

        let report = IncludeScanPipeline::new().build(&request(unit, search)).await.unwrap();
        assert!(matches!(&report.status, BuildStatus::Failed(message) if message.contains("Missing.h")));
        assert_eq!(names(&report), vec!["B"]);
    }

    #[tokio::test]
    async fn test_quoted_toolchain_header() {
        let temp_dir = tempfile::tempdir().unwrap();
        let hardware = temp_dir.path().join("hardware");
        write(&hardware, "arduino/avr/cores/arduino/Arduino.h", "");
        let unit = write(temp_dir.path(), "sketch/sketch.ino", "#include \"Arduino.h\"\n#include <avr/io.h>\n");
        let search = SearchContext { hardware: vec![hardware], ..Default::default() };

        let report = IncludeScanPipeline::new().build(&request(unit, search)).await.unwrap();
        assert!(report.is_success());
        assert!(report.imported.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_name_beats_search_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let other = temp_dir.path().join("libraries");
        // Both provide `Servo.h`; the folder named after the header wins.
        write(&other, "AAA-Robot/src/Servo.h", "");
        write(&other, "Servo/src/Servo.h", "");
        let unit = write(temp_dir.path(), "sketch/sketch.ino", "#include <Servo.h>\n");
        let search = SearchContext { other: vec![other.clone()], ..Default::default() };

        let report = IncludeScanPipeline::new().build(&request(unit, search)).await.unwrap();
        assert_eq!(names(&report), vec!["Servo"]);
    }

    #[tokio::test]
    async fn test_alias_selects_mismatched_folder() {
        let temp_dir = tempfile::tempdir().unwrap();
        let other = temp_dir.path().join("libraries");
        write(&other, "aaa-fork/src/MyLib.h", "");
        let folder = other.join("mylib-2.0.0");
        write(&folder, "library.properties", "name=MyLib\nversion=2.0.0\n");
        write(&folder, "src/MyLib.h", "");
        let unit = write(temp_dir.path(), "sketch/sketch.ino", "#include \"MyLib.h\"\n");
        let search = SearchContext { other: vec![other.clone()], ..Default::default() };

        let without = IncludeScanPipeline::new().build(&request(unit.clone(), search.clone())).await.unwrap();
        assert_eq!(without.imported[0].folder, other.join("aaa-fork"));

        let aliased = search.with_alias("MyLib", &folder).unwrap();
        let with = IncludeScanPipeline::new().build(&request(unit, aliased)).await.unwrap();
        assert!(with.is_success());
        assert_eq!(with.imported, vec![ImportedLibrary { name: "MyLib".to_string(), folder }]);
    }

    #[tokio::test]
    async fn test_parent_relative_include_cycle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let other = temp_dir.path().join("libraries");
        write(&other, "Lib/src/Lib.h", "#include \"utility/helper.h\"\n");
        write(&other, "Lib/src/utility/helper.h", "#include \"../Lib.h\"\n");
        let unit = write(temp_dir.path(), "sketch/sketch.ino", "#include <Lib.h>\n");
        let search = SearchContext { other: vec![other.clone()], ..Default::default() };

        let report = IncludeScanPipeline::new().build(&request(unit, search)).await.unwrap();
        assert!(report.is_success());
        assert_eq!(names(&report), vec!["Lib"]);
    }

    #[tokio::test]
    async fn test_sibling_include_cycle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let other = temp_dir.path().join("libraries");
        write(&other, "Multi/src/a/A.h", "#include \"../b/B.h\"\n");
        write(&other, "Multi/src/b/B.h", "#include \"../a/A.h\"\n");
        let unit = write(temp_dir.path(), "sketch/sketch.ino", "#include <a/A.h>\n");
        let search = SearchContext { other: vec![other.clone()], ..Default::default() };

        let report = IncludeScanPipeline::new().build(&request(unit, search)).await.unwrap();
        assert!(report.is_success(), "{:?}", report.status);
        assert_eq!(names(&report), vec!["Multi"]);
    }

    #[rstest]
    #[case("/libs/Lib/src/utility/../Lib.h", "/libs/Lib/src/Lib.h")]
    #[case("/libs/Lib/src/./a/../b/./B.h", "/libs/Lib/src/b/B.h")]
    #[case("/libs/Lib/src/utility/../utility/../Lib.h", "/libs/Lib/src/Lib.h")]
    #[case("/../Lib.h", "/Lib.h")]
    #[case("../up/Lib.h", "../up/Lib.h")]
    #[case("a/../../Lib.h", "../Lib.h")]
    fn test_normalize(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(normalize(Path::new(path)), PathBuf::from(expected));
    }

    #[test]
    fn test_cache_reused_for_same_roots() {
        let cache: Cache<usize> = Mutex::new(None);
        let mut builds = 0;
        let mut build = |roots: &[PathBuf]| -> Result<usize> {
            builds += 1;
            Ok(roots.len())
        };
        let first = cached(&cache, vec![PathBuf::from("/libraries")], &mut build).unwrap();
        let second = cached(&cache, vec![PathBuf::from("/libraries")], &mut build).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let third = cached(&cache, vec![PathBuf::from("/libraries"), PathBuf::from("/ide")], &mut build).unwrap();
        assert_eq!(*third, 2);
        assert_eq!(builds, 2);
    }

    #[tokio::test]
    async fn test_library_index_shared_between_builds() {
        let temp_dir = tempfile::tempdir().unwrap();
        let other = temp_dir.path().join("libraries");
        write(&other, "A/src/A.h", "");
        let unit = write(temp_dir.path(), "sketch/sketch.ino", "#include <A.h>\n");
        let search = SearchContext { other: vec![other.clone()], ..Default::default() };
        let pipeline = IncludeScanPipeline::new();

        pipeline.build(&request(unit.clone(), search.clone())).await.unwrap();
        let indexed = pipeline.libraries.lock().unwrap().as_ref().map(|entry| Arc::clone(&entry.value)).unwrap();
        let report = pipeline.build(&request(unit, search)).await.unwrap();
        assert_eq!(names(&report), vec!["A"]);
        let reused = pipeline.libraries.lock().unwrap().as_ref().map(|entry| Arc::clone(&entry.value)).unwrap();
        assert!(Arc::ptr_eq(&indexed, &reused));
    }

    #[tokio::test]
    async fn test_missing_unit_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = IncludeScanPipeline::new()
            .build(&request(temp_dir.path().join("sketch.ino"), SearchContext::default()))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
    }
}
