//! Loading and atomically persisting the catalog and processed-cache.

use crate::error::{ErrorKind, Result};
use crate::{Catalog, ProcessedCache};
use exn::ResultExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Indentation used when writing JSON documents; matches existing catalogs.
const INDENT: &[u8] = b"    ";

/// Paths of the two persisted artifacts.
#[derive(Debug, Clone)]
pub struct Store {
    catalog: PathBuf,
    processed: PathBuf,
}
impl Store {
    pub fn new(catalog: impl Into<PathBuf>, processed: impl Into<PathBuf>) -> Self {
        Self { catalog: catalog.into(), processed: processed.into() }
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog
    }

    pub fn processed_path(&self) -> &Path {
        &self.processed
    }

    /// Load the catalog. A missing or malformed catalog is an error.
    #[instrument(skip(self), fields(path = %self.catalog.display()))]
    pub fn load_catalog(&self) -> Result<Catalog> {
        let catalog: Catalog = read_json(&self.catalog)?;
        tracing::info!(libraries = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    /// Load the processed-cache. A missing file is an empty cache, but a file
    /// that exists and doesn't decode is an error.
    #[instrument(skip(self), fields(path = %self.processed.display()))]
    pub fn load_processed(&self) -> Result<ProcessedCache> {
        match read_json::<ProcessedCache>(&self.processed) {
            Ok(cache) => {
                tracing::info!(processed = cache.len(), "Processed-cache loaded");
                Ok(cache)
            },
            Err(e) if matches!(&*e, ErrorKind::NotFound(_)) => {
                tracing::info!("No processed-cache found; starting from scratch");
                Ok(ProcessedCache::new())
            },
            Err(e) => Err(e),
        }
    }

    pub fn save_catalog(&self, catalog: &Catalog) -> Result<()> {
        write_json_atomic(&self.catalog, catalog)
    }

    pub fn save_processed(&self, processed: &ProcessedCache) -> Result<()> {
        write_json_atomic(&self.processed, processed)
    }

    /// Write both artifacts. The catalog goes first: it's the source of truth,
    /// and a cache that's behind only costs a re-probe.
    pub fn save(&self, catalog: &Catalog, processed: &ProcessedCache) -> Result<()> {
        self.save_catalog(catalog)?;
        self.save_processed(processed)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == IoErrorKind::NotFound => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Io(path.to_path_buf())),
    };
    serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Malformed(path.to_path_buf()))
}

/// Serializes `value` and writes it to `path` so that a reader only ever sees
/// the previous contents or the complete new contents.
///
/// Serialization happens in memory first. The bytes are written to a temporary
/// file in the same directory (same filesystem, so the rename is atomic),
/// synced, renamed over `path`, and finally the directory itself is synced so
/// the rename is durable.
#[instrument(skip(value), fields(path = %path.display()))]
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut bytes, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut serializer).or_raise(|| ErrorKind::Serialize)?;
    bytes.push(b'\n');

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let io = || ErrorKind::Io(path.to_path_buf());
    fs::create_dir_all(&parent).or_raise(io)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent).or_raise(io)?;
    tmp.write_all(&bytes).or_raise(io)?;
    tmp.flush().or_raise(io)?;
    tmp.as_file().sync_all().or_raise(io)?;
    tmp.persist(path).map_err(|e| e.error).or_raise(io)?;
    sync_directory(&parent);
    tracing::debug!(bytes = bytes.len(), "Written atomically");
    Ok(())
}

/// Best effort: not every platform (or filesystem) lets a directory be
/// opened and synced.
fn sync_directory(dir: &Path) {
    #[cfg(unix)]
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        tracing::trace!(dir = %dir.display(), error = %e, "Could not sync directory");
    }
    #[cfg(not(unix))]
    let _ = dir;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LibraryRecord;

    fn store(dir: &Path) -> Store {
        Store::new(dir.join("library_index.json"), dir.join("cached_results.json"))
    }

    #[test]
    fn test_missing_processed_cache_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = store(temp_dir.path()).load_processed().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_malformed_processed_cache_is_fatal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        fs::write(store.processed_path(), b"{\"name\": {\"A\": tru").unwrap();
        let err = store.load_processed().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed(_)));
    }

    #[test]
    fn test_missing_catalog_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = store(temp_dir.path()).load_catalog().unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_malformed_catalog_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        fs::write(store.catalog_path(), b"{\"libraries\": {}}").unwrap();
        let err = store.load_catalog().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Malformed(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        let mut catalog = Catalog::new(vec![LibraryRecord::new("A", "1.0.0"), LibraryRecord::new("B", "1.0.0")]);
        catalog.set_requires(1, vec!["A".to_string()], None);
        let processed: ProcessedCache = ["A", "B"].into_iter().collect();
        store.save(&catalog, &processed).unwrap();

        assert_eq!(store.load_catalog().unwrap(), catalog);
        assert_eq!(store.load_processed().unwrap(), processed);
        let written = fs::read_to_string(store.catalog_path()).unwrap();
        assert!(written.starts_with("{\n    \"libraries\": [\n        {"));
    }

    #[test]
    fn test_atomic_write_replaces_existing_and_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("library_index.json");
        fs::write(&path, b"old contents").unwrap();
        write_json_atomic(&path, &Catalog::default()).unwrap();
        let reloaded: Catalog = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(reloaded.is_empty());
        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_atomic_write_creates_parent_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let nested = temp_dir.path().join("a/b/cached_results.json");
        write_json_atomic(&nested, &ProcessedCache::new()).unwrap();
        assert!(nested.is_file());
    }
}
