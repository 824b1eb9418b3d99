use derive_more::Display;
use libprobe_probe::{LibraryDir, SearchContext, list_libraries};
use std::ops::Deref;

/// Which kind of library root a library was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Origin {
    /// A third-party ("other libraries") root.
    #[display("other")]
    Other,
    /// A root bundled with the IDE or a core.
    #[display("built-in")]
    BuiltIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledLibrary {
    pub dir: LibraryDir,
    pub origin: Origin,
}
impl Deref for InstalledLibrary {
    type Target = LibraryDir;

    fn deref(&self) -> &Self::Target {
        &self.dir
    }
}

/// Every installed library, in search order: each "other libraries" root in
/// turn, then each built-in root. Within a root, folders are sorted by name.
pub fn discover(search: &SearchContext) -> Vec<InstalledLibrary> {
    let roots = search
        .other
        .iter()
        .map(|root| (root, Origin::Other))
        .chain(search.built_in.iter().map(|root| (root, Origin::BuiltIn)));
    let mut installed = Vec::new();
    for (root, origin) in roots {
        let found = list_libraries(root);
        tracing::debug!(root = %root.display(), %origin, libraries = found.len(), "Listed library root");
        installed.extend(found.into_iter().map(|dir| InstalledLibrary { dir, origin }));
    }
    installed
}
