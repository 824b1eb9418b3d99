use libprobe_probe::ImportedLibrary;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A library's dependencies, split by where they come from. The two sets are
/// always disjoint and sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyClassification {
    /// Distributed through the catalog (found under an "other libraries" root).
    pub external: BTreeSet<String>,
    /// Provided by the IDE or a core.
    pub local: BTreeSet<String>,
}
impl DependencyClassification {
    pub fn contains(&self, name: &str) -> bool {
        self.external.contains(name) || self.local.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.external.is_empty() && self.local.is_empty()
    }

    /// Adds a dependency unless it's already classified either way.
    pub fn insert(&mut self, name: impl Into<String>, external: bool) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        match external {
            true => self.external.insert(name),
            false => self.local.insert(name),
        }
    }

    /// Unions `other` into `self`, keeping existing classifications.
    pub fn merge(&mut self, other: &Self) {
        for name in &other.external {
            self.insert(name.as_str(), true);
        }
        for name in &other.local {
            self.insert(name.as_str(), false);
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.external.remove(name);
        self.local.remove(name);
    }

    /// Value for the catalog's `requires` field.
    pub fn requires(&self) -> Vec<String> {
        self.external.iter().cloned().collect()
    }

    pub fn bundled(&self) -> Vec<String> {
        self.local.iter().cloned().collect()
    }
}

/// Decides whether an imported library is externally distributed, by
/// whether its folder lies under one of the "other libraries" roots.
#[derive(Debug, Clone)]
pub struct Classifier {
    roots: Vec<PathBuf>,
    canonical_roots: Vec<PathBuf>,
}
impl Classifier {
    pub fn new(other_roots: &[PathBuf]) -> Self {
        let canonical_roots = other_roots.iter().filter_map(|root| fs::canonicalize(root).ok()).collect();
        Self { roots: other_roots.to_vec(), canonical_roots }
    }

    /// Component-wise: `/libs` contains `/libs/Servo`, but not `/libs-old/Servo`.
    pub fn is_external(&self, folder: &Path) -> bool {
        if self.roots.iter().any(|root| folder.starts_with(root)) {
            return true;
        }
        // Pipelines may report resolved paths.
        fs::canonicalize(folder).is_ok_and(|folder| self.canonical_roots.iter().any(|root| folder.starts_with(root)))
    }

    /// Classifies `imported`, leaving out `own_name` itself.
    pub fn classify(&self, own_name: &str, imported: &[ImportedLibrary]) -> DependencyClassification {
        let mut classification = DependencyClassification::default();
        for library in imported.iter().filter(|library| library.name != own_name) {
            classification.insert(library.name.as_str(), self.is_external(&library.folder));
        }
        classification
    }
}
